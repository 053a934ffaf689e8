//! Surface tessellation into the shared vertex and index buffers.

use glam::{Vec2, Vec3};

use super::batch::{texture_sorted_order, BrushModelCache, SurfaceBatch};
use super::renderer::BrushStatistics;
use crate::backend::{BrushVertex, IndexFormat};
use crate::buffer::BufferArena;
use crate::error::{BrushError, BrushResult};
use crate::host::{BrushSurface, LightmapAtlas, SurfaceSource};

/// Indices produced by fanning a polygon with `edges` edges.
pub fn fan_index_count(edges: u32) -> u32 {
    if edges >= 3 {
        3 * (edges - 2)
    } else {
        0
    }
}

/// Material texture coordinates of `position`, normalised by texture size.
pub fn material_uv(surface: &BrushSurface, position: Vec3) -> Vec2 {
    let [s, t] = surface.texinfo.project(position);
    let texture = &surface.texinfo.texture;
    Vec2::new(s / texture.width.max(1) as f32, t / texture.height.max(1) as f32)
}

/// Lightmap atlas coordinates of `position`.
///
/// Samples land on luxel centres of the surface's patch inside a
/// `block_size` square atlas block.
pub fn lightmap_uv(surface: &BrushSurface, position: Vec3, block_size: u32) -> Vec2 {
    let lm = &surface.lightmap;
    let sample = lm.sample_size;
    let scale = block_size as f32 * sample;
    let luxel = [lm.light_s as f32, lm.light_t as f32];

    let coord = |axis: usize| {
        let projected = position.dot(lm.vecs[axis].truncate()) + lm.vecs[axis].w;
        (projected - lm.mins[axis] + luxel[axis] * sample + 0.5 * sample) / scale
    };
    Vec2::new(coord(0), coord(1))
}

/// Bake the drawable surfaces of `model` into `arena`.
///
/// Nothing is allocated when the model can't be addressed with 16-bit
/// indices. Vertex and index data are written once the whole model has
/// been tessellated.
pub fn bake_surfaces(
    model: &dyn SurfaceSource,
    arena: &mut dyn BufferArena,
    lightmaps: &mut dyn LightmapAtlas,
    stats: &mut BrushStatistics,
) -> BrushResult<BrushModelCache> {
    let surfaces = model.surfaces();

    let mut num_vertices = 0u32;
    let mut num_indices = 0u32;
    for (i, surface) in surfaces.iter().enumerate() {
        if surface.flags.is_excluded() {
            log::trace!(
                "Skipping surface {} of {} (flags {:?})",
                i,
                model.name(),
                surface.flags
            );
            continue;
        }
        num_vertices += surface.num_edges;
        num_indices += fan_index_count(surface.num_edges);
    }

    if num_vertices >= u16::MAX as u32 {
        log::error!(
            "Model {} indices don't fit into 16 bits",
            model.name()
        );
        return Err(BrushError::IndexOverflow {
            model: model.name().to_string(),
            vertices: num_vertices,
        });
    }

    let vertex_alloc = arena
        .allocate(BrushVertex::STRIDE, num_vertices)
        .ok_or(BrushError::OutOfVertexSpace {
            requested: num_vertices,
        })?;
    let index_alloc = arena
        .allocate(IndexFormat::Uint16.size(), num_indices)
        .ok_or(BrushError::OutOfIndexSpace {
            requested: num_indices,
        })?;

    let block_size = lightmaps.block_size();
    let mut vertices: Vec<BrushVertex> = Vec::with_capacity(num_vertices as usize);
    let mut indices: Vec<u16> = Vec::with_capacity(num_indices as usize);
    let order = texture_sorted_order(surfaces);
    let mut entries = Vec::with_capacity(order.len());

    for index in order {
        let surface = &surfaces[index];
        lightmaps.ensure_surface_lightmap(model, index);

        let base = vertices.len() as u16;
        let index_offset = index_alloc.unit_offset + indices.len() as u32;

        for k in 0..surface.num_edges {
            let position = model.polygon_vertex(surface, k);
            vertices.push(BrushVertex {
                position,
                material_uv: material_uv(surface, position),
                lightmap_uv: lightmap_uv(surface, position, block_size),
            });

            if k > 1 {
                let k = k as u16;
                indices.extend_from_slice(&[base, base + k - 1, base + k]);
            }
        }

        entries.push(SurfaceBatch {
            texture: surface.texture_id(),
            index_offset,
            index_count: index_alloc.unit_offset + indices.len() as u32 - index_offset,
        });
    }

    debug_assert_eq!(vertices.len() as u32, num_vertices);
    debug_assert_eq!(indices.len() as u32, num_indices);

    arena.write(&vertex_alloc, bytemuck::cast_slice(&vertices));
    arena.write(&index_alloc, bytemuck::cast_slice(&indices));

    stats.num_vertices += num_vertices;
    stats.num_indices += num_indices;

    Ok(BrushModelCache::new(vertex_alloc.unit_offset, entries))
}
