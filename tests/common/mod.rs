//! Common utilities for brush renderer integration tests.
//!
//! Provides in-memory stand-ins for the host collaborators (texture
//! registry, uniform slots, lightmap atlas) and small model builders.

#![allow(dead_code)]

use std::collections::HashMap;

use glam::{Vec3, Vec4};

use brush_renderer::backend::{BufferHandle, DescriptorSetHandle, RecordingBackend};
use brush_renderer::brush::MemoryShaderLoader;
use brush_renderer::host::{
    LightmapAtlas, LightmapPlacement, MaterialTexture, SurfaceFlags, SurfaceSource, TexInfo,
    TextureId, TextureRegistry, UniformBinding, UniformBindings,
};
use brush_renderer::{BrushConfig, BrushModel, BrushRenderer, HostBufferArena};

pub const ARENA_BUFFER: u64 = 0xB0;
pub const ATLAS_TEXTURE: TextureId = 900;
pub const UNIFORM_SET: u64 = 0x500;

/// Descriptor handed out for a texture id.
pub fn texture_descriptor(texture: TextureId) -> DescriptorSetHandle {
    DescriptorSetHandle::from_raw(0x1000 + texture as u64)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Host fakes
// ============================================================================

/// Registry with a descriptor for every non-negative texture except the
/// ones listed as missing.
#[derive(Debug, Default)]
pub struct FakeTextures {
    pub missing: Vec<TextureId>,
}

impl TextureRegistry for FakeTextures {
    fn texture_descriptor(&self, texture: TextureId) -> Option<DescriptorSetHandle> {
        (texture >= 0 && !self.missing.contains(&texture)).then(|| texture_descriptor(texture))
    }
}

/// One uniform set with 256-byte slots.
#[derive(Debug, Default)]
pub struct FakeUniforms;

impl UniformBindings for FakeUniforms {
    fn uniform_binding(&self, index: u32) -> Option<UniformBinding> {
        Some(UniformBinding {
            set: DescriptorSetHandle::from_raw(UNIFORM_SET),
            dynamic_offset: index * 256,
        })
    }
}

/// Atlas that records which surfaces had their lightmaps built.
#[derive(Debug)]
pub struct FakeAtlas {
    pub texture: Option<TextureId>,
    pub built: HashMap<String, Vec<usize>>,
}

impl Default for FakeAtlas {
    fn default() -> Self {
        Self {
            texture: Some(ATLAS_TEXTURE),
            built: HashMap::new(),
        }
    }
}

impl LightmapAtlas for FakeAtlas {
    fn ensure_surface_lightmap(&mut self, model: &dyn SurfaceSource, surface_index: usize) {
        self.built
            .entry(model.name().to_string())
            .or_default()
            .push(surface_index);
    }

    fn atlas_texture(&self) -> Option<TextureId> {
        self.texture
    }
}

// ============================================================================
// Test context
// ============================================================================

pub fn test_shaders() -> MemoryShaderLoader {
    MemoryShaderLoader::new()
        .with_shader("brush.vert.spv", vec![0x0723_0203, 0x0001_0000])
        .with_shader("brush.frag.spv", vec![0x0723_0203, 0x0001_0000])
}

pub struct TestContext {
    pub backend: RecordingBackend,
    pub renderer: BrushRenderer,
    pub arena: HostBufferArena,
    pub textures: FakeTextures,
    pub uniforms: FakeUniforms,
    pub atlas: FakeAtlas,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(BrushConfig::default())
    }

    pub fn with_config(config: BrushConfig) -> Self {
        init_logging();
        let mut backend = RecordingBackend::new();
        let renderer = BrushRenderer::initialize(&mut backend, &test_shaders(), config)
            .expect("brush renderer should initialize");
        Self {
            backend,
            renderer,
            arena: HostBufferArena::new(BufferHandle::from_raw(ARENA_BUFFER), 1 << 20),
            textures: FakeTextures::default(),
            uniforms: FakeUniforms,
            atlas: FakeAtlas::default(),
        }
    }

    pub fn begin_frame(&mut self) {
        self.renderer
            .begin_frame(&mut self.backend, &self.arena, &self.textures, &self.atlas)
            .expect("frame should begin");
    }

    pub fn draw(&mut self, model: u32, render_mode: i32) {
        self.renderer.draw_model(
            &mut self.backend,
            brush_renderer::ModelId(model),
            render_mode,
            0,
            &self.textures,
            &self.uniforms,
        );
    }
}

// ============================================================================
// Model builders
// ============================================================================

pub fn texinfo(texture: TextureId) -> TexInfo {
    TexInfo {
        vecs: [Vec4::new(1.0, 0.0, 0.0, 0.0), Vec4::new(0.0, 1.0, 0.0, 0.0)],
        texture: MaterialTexture {
            id: texture,
            width: 64,
            height: 64,
        },
    }
}

/// Regular polygon with `edges` corners in the z = 0 plane.
pub fn polygon(edges: usize) -> Vec<Vec3> {
    (0..edges)
        .map(|k| {
            let angle = k as f32 / edges as f32 * std::f32::consts::TAU;
            Vec3::new(angle.cos() * 64.0, angle.sin() * 64.0, 0.0)
        })
        .collect()
}

/// Model with one polygon per `(texture, edges, flags)` entry, in order.
pub fn build_model(name: &str, surfaces: &[(TextureId, usize, SurfaceFlags)]) -> BrushModel {
    let mut model = BrushModel::new(name);
    for &(texture, edges, flags) in surfaces {
        model.push_polygon(
            &polygon(edges),
            flags,
            texinfo(texture),
            LightmapPlacement::default(),
        );
    }
    model
}

/// Model of quads, one per texture id.
pub fn quad_model(name: &str, textures: &[TextureId]) -> BrushModel {
    let surfaces: Vec<_> = textures
        .iter()
        .map(|&texture| (texture, 4, SurfaceFlags::empty()))
        .collect();
    build_model(name, &surfaces)
}
