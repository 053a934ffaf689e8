//! Engine-side brush model data
//!
//! Mirrors the BSP layout the engine loads from disk: shared vertex and edge
//! lumps, a signed surf-edge list, and surfaces referencing ranges of it.
//! A brush model is a contiguous range of the world's surfaces.

use bitflags::bitflags;
use glam::{Vec3, Vec4};

use super::{SurfaceSource, TextureId};

bitflags! {
    /// Surface flags set by the engine's model loader.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u32 {
        const PLANE_BACK = 1 << 1;
        const DRAW_SKY = 1 << 2;
        const DRAW_TURB_QUADS = 1 << 3;
        const DRAW_TURB = 1 << 4;
        const DRAW_TILED = 1 << 5;
        const CONVEYOR = 1 << 6;
        const DRAW_LIGHTMAP = 1 << 7;
    }
}

impl SurfaceFlags {
    /// Flags of surfaces the brush renderer never bakes.
    pub const EXCLUDED: Self = Self::DRAW_SKY
        .union(Self::DRAW_TURB)
        .union(Self::CONVEYOR)
        .union(Self::DRAW_TURB_QUADS)
        .union(Self::DRAW_TILED);

    pub fn is_excluded(&self) -> bool {
        self.intersects(Self::EXCLUDED)
    }
}

/// Material texture a surface is drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialTexture {
    /// Texture registry id; negative means "no texture".
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

/// Texture projection of a surface.
///
/// `vecs[n].xyz` is the projection axis, `vecs[n].w` the offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexInfo {
    pub vecs: [Vec4; 2],
    pub texture: MaterialTexture,
}

impl TexInfo {
    /// Project a point into texel space (not normalised).
    pub fn project(&self, position: Vec3) -> [f32; 2] {
        [
            position.dot(self.vecs[0].truncate()) + self.vecs[0].w,
            position.dot(self.vecs[1].truncate()) + self.vecs[1].w,
        ]
    }
}

/// Where a surface's lighting lives in the lightmap atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightmapPlacement {
    /// Lightmap projection axes, same convention as [`TexInfo::vecs`].
    pub vecs: [Vec4; 2],
    /// Projected minimum of the surface's extents.
    pub mins: [f32; 2],
    /// Block-relative luxel position assigned by the atlas.
    pub light_s: i32,
    pub light_t: i32,
    /// World units per luxel.
    pub sample_size: f32,
}

impl Default for LightmapPlacement {
    fn default() -> Self {
        Self {
            vecs: [Vec4::X, Vec4::Y],
            mins: [0.0; 2],
            light_s: 0,
            light_t: 0,
            sample_size: 16.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrushSurface {
    pub flags: SurfaceFlags,
    /// First entry in the model's surf-edge list
    pub first_edge: u32,
    pub num_edges: u32,
    pub texinfo: TexInfo,
    pub lightmap: LightmapPlacement,
}

impl BrushSurface {
    pub fn texture_id(&self) -> TextureId {
        self.texinfo.texture.id
    }
}

/// Polygon soup of a brush model in BSP form.
#[derive(Debug, Clone, Default)]
pub struct BrushModel {
    pub name: String,
    pub vertices: Vec<Vec3>,
    /// Edge endpoints as indices into `vertices`
    pub edges: Vec<[u32; 2]>,
    /// Signed edge references; negative walks the edge backwards
    pub surf_edges: Vec<i32>,
    pub surfaces: Vec<BrushSurface>,
    pub first_model_surface: usize,
    pub num_model_surfaces: usize,
}

impl BrushModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            // Edge 0 is reserved so every real edge can be referenced with a sign
            edges: vec![[0, 0]],
            ..Default::default()
        }
    }

    /// Append a polygon as a new model surface and return its index within
    /// the model.
    ///
    /// Every edge is stored once and referenced positively, except the
    /// closing edge which is stored reversed and referenced negatively, so
    /// both surf-edge directions get exercised.
    pub fn push_polygon(
        &mut self,
        positions: &[Vec3],
        flags: SurfaceFlags,
        texinfo: TexInfo,
        lightmap: LightmapPlacement,
    ) -> usize {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(positions);

        let first_edge = self.surf_edges.len() as u32;
        let count = positions.len() as u32;
        for k in 0..count {
            let a = base + k;
            let b = base + (k + 1) % count;
            let edge = self.edges.len() as i32;
            if k + 1 == count && count > 1 {
                self.edges.push([b, a]);
                self.surf_edges.push(-edge);
            } else {
                self.edges.push([a, b]);
                self.surf_edges.push(edge);
            }
        }

        self.surfaces.push(BrushSurface {
            flags,
            first_edge,
            num_edges: count,
            texinfo,
            lightmap,
        });
        self.num_model_surfaces = self.surfaces.len() - self.first_model_surface;
        self.num_model_surfaces - 1
    }
}

impl SurfaceSource for BrushModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn surfaces(&self) -> &[BrushSurface] {
        let end = self.first_model_surface + self.num_model_surfaces;
        &self.surfaces[self.first_model_surface..end]
    }

    fn polygon_vertex(&self, surface: &BrushSurface, k: u32) -> Vec3 {
        let surf_edge = self.surf_edges[(surface.first_edge + k) as usize];
        let edge = self.edges[surf_edge.unsigned_abs() as usize];
        let vertex = if surf_edge >= 0 { edge[0] } else { edge[1] };
        self.vertices[vertex as usize]
    }
}
