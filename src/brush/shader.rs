//! SPIR-V shader sources.

use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

use crate::error::{BrushError, BrushResult};

/// Source of compiled SPIR-V shaders, looked up by file name.
pub trait ShaderLoader {
    fn load_spirv(&self, name: &str) -> BrushResult<Vec<u32>>;
}

/// Loads `.spv` files from a directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct DirectoryShaderLoader {
    root: PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl DirectoryShaderLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ShaderLoader for DirectoryShaderLoader {
    fn load_spirv(&self, name: &str) -> BrushResult<Vec<u32>> {
        let path = self.root.join(name);
        let load_error = |reason: String| BrushError::ShaderLoad {
            name: name.to_string(),
            reason,
        };

        let mut file = std::fs::File::open(&path)
            .map_err(|e| load_error(format!("{}: {}", path.display(), e)))?;
        let code = ash::util::read_spv(&mut file).map_err(|e| load_error(e.to_string()))?;

        log::debug!("Loaded shader {} ({} words)", path.display(), code.len());
        Ok(code)
    }
}

/// In-memory shader table, for embedded shaders and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryShaderLoader {
    shaders: HashMap<String, Vec<u32>>,
}

impl MemoryShaderLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shader(mut self, name: impl Into<String>, code: Vec<u32>) -> Self {
        self.shaders.insert(name.into(), code);
        self
    }
}

impl ShaderLoader for MemoryShaderLoader {
    fn load_spirv(&self, name: &str) -> BrushResult<Vec<u32>> {
        self.shaders
            .get(name)
            .cloned()
            .ok_or_else(|| BrushError::ShaderLoad {
                name: name.to_string(),
                reason: "not found".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader() {
        let loader = MemoryShaderLoader::new().with_shader("brush.vert.spv", vec![0x0723_0203, 1]);
        assert_eq!(loader.load_spirv("brush.vert.spv").unwrap().len(), 2);
        assert!(matches!(
            loader.load_spirv("missing.spv"),
            Err(BrushError::ShaderLoad { .. })
        ));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_directory_loader_reads_spirv() {
        let dir = std::env::temp_dir().join(format!("brush-shaders-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let words: [u32; 3] = [0x0723_0203, 0x0001_0000, 7];
        std::fs::write(dir.join("brush.vert.spv"), bytemuck::cast_slice(&words)).unwrap();

        let loader = DirectoryShaderLoader::new(&dir);
        assert_eq!(loader.load_spirv("brush.vert.spv").unwrap(), words.to_vec());
        assert!(loader.load_spirv("brush.frag.spv").is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
