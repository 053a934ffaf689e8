//! Brush Renderer - static map geometry for a Vulkan renderer plugin
//!
//! Turns engine brush models (BSP polygon surfaces) into one shared 16-bit
//! indexed vertex buffer and draws them batched by texture.
//!
//! # Features
//! - Triangle-fan tessellation with material and lightmap atlas UVs
//! - Texture-sorted surface batches coalesced into one draw per texture run
//! - One pipeline per blend/depth configuration, selected by render mode
//! - Vulkan backend via ash and gpu-allocator (native only)
//! - Recording backend for headless runs and tests
//!
//! # Example
//!
//! ```ignore
//! let mut renderer = BrushRenderer::initialize(&mut backend, &shaders, BrushConfig::default())?;
//! renderer.load_model(ModelId(1), &model, &mut arena, &mut lightmaps)?;
//!
//! renderer.begin_frame(&mut backend, &arena, &textures, &lightmaps)?;
//! renderer.draw_model(&mut backend, ModelId(1), RenderMode::Normal as i32, 0, &textures, &uniforms);
//! renderer.end_frame();
//! ```

pub mod backend;
pub mod brush;
pub mod buffer;
pub mod error;
pub mod host;

pub use backend::{BrushBackend, CompareFunction, CullMode, RecordingBackend};
#[cfg(not(target_arch = "wasm32"))]
pub use backend::vulkan::VulkanBackend;
pub use brush::{BrushRenderer, LoadOutcome, PipelineKind, RenderMode, ShaderLoader};
pub use buffer::{BufferArena, HostBufferArena};
pub use error::{BrushError, BrushResult};
pub use host::{BrushModel, ModelId};

/// Configuration for the brush renderer
#[derive(Debug, Clone)]
pub struct BrushConfig {
    /// SPIR-V vertex shader file
    pub vertex_shader: String,
    /// SPIR-V fragment shader file
    pub fragment_shader: String,
    /// Fragments with alpha below this are discarded in `TransAlpha` mode
    pub alpha_test_threshold: f32,
    /// Name pipelines and wrap each model's draws in a debug label
    pub debug_labels: bool,
    pub depth_compare: CompareFunction,
    pub cull_mode: CullMode,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            vertex_shader: "brush.vert.spv".to_string(),
            fragment_shader: "brush.frag.spv".to_string(),
            alpha_test_threshold: 0.25,
            debug_labels: false,
            depth_compare: CompareFunction::Less,
            cull_mode: CullMode::Front,
        }
    }
}

impl BrushConfig {
    pub fn with_shaders(mut self, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.vertex_shader = vertex.into();
        self.fragment_shader = fragment.into();
        self
    }

    pub fn with_alpha_test_threshold(mut self, threshold: f32) -> Self {
        self.alpha_test_threshold = threshold;
        self
    }

    pub fn with_debug_labels(mut self, enabled: bool) -> Self {
        self.debug_labels = enabled;
        self
    }

    pub fn with_depth_compare(mut self, compare: CompareFunction) -> Self {
        self.depth_compare = compare;
        self
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }
}
