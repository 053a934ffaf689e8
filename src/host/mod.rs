//! Interfaces to the host engine and renderer
//!
//! The brush renderer does not own world data, textures, uniform buffers or
//! the lightmap atlas. It reaches them through these traits.

mod model;

pub use model::*;

use glam::Vec3;

use crate::backend::DescriptorSetHandle;

/// Texture registry id. Negative ids mean "no texture" and are never drawn.
pub type TextureId = i32;

/// Identity of a loaded model, chosen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u32);

/// Read-only view of a brush model's surfaces.
pub trait SurfaceSource {
    /// Model name, for diagnostics
    fn name(&self) -> &str;

    /// Surfaces belonging to this model, in source order
    fn surfaces(&self) -> &[BrushSurface];

    /// Position of the `k`th polygon vertex of `surface`
    fn polygon_vertex(&self, surface: &BrushSurface, k: u32) -> Vec3;
}

/// Lookup of per-texture descriptor sets.
pub trait TextureRegistry {
    fn texture_descriptor(&self, texture: TextureId) -> Option<DescriptorSetHandle>;
}

/// Descriptor set and dynamic offset selecting one uniform buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBinding {
    pub set: DescriptorSetHandle,
    pub dynamic_offset: u32,
}

/// Per-draw uniform buffer slots, filled in by the scene layer.
pub trait UniformBindings {
    fn uniform_binding(&self, index: u32) -> Option<UniformBinding>;
}

/// The lightmap atlas builder.
pub trait LightmapAtlas {
    /// Build and upload the lightmap patch of a model surface.
    ///
    /// Must be idempotent per surface; the baker calls it once per kept
    /// surface before the surface can be drawn.
    fn ensure_surface_lightmap(&mut self, model: &dyn SurfaceSource, surface_index: usize);

    /// Texture holding the atlas, once one exists
    fn atlas_texture(&self) -> Option<TextureId>;

    /// Width and height of one atlas block, in luxels
    fn block_size(&self) -> u32 {
        128
    }
}
