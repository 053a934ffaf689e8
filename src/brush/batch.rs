//! Texture-sorted surface batches and draw coalescing.

use crate::host::{BrushSurface, TextureId};

/// Contiguous index range of one baked surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceBatch {
    pub texture: TextureId,
    /// Absolute offset into the shared index buffer, in indices
    pub index_offset: u32,
    pub index_count: u32,
}

impl SurfaceBatch {
    pub fn index_end(&self) -> u32 {
        self.index_offset + self.index_count
    }
}

/// Per-model data derived at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrushModelCache {
    vertex_offset: u32,
    entries: Vec<SurfaceBatch>,
    runs: Vec<TextureRun>,
}

impl BrushModelCache {
    /// Build a cache record from entries in texture-sorted order.
    ///
    /// # Panics
    ///
    /// Panics if the entries are not back to back in the index buffer.
    pub fn new(vertex_offset: u32, entries: Vec<SurfaceBatch>) -> Self {
        for pair in entries.windows(2) {
            assert_eq!(
                pair[1].index_offset,
                pair[0].index_end(),
                "brush batch entries must be contiguous"
            );
        }
        let runs = texture_runs(&entries);
        Self {
            vertex_offset,
            entries,
            runs,
        }
    }

    /// First vertex of the model in the shared buffer, used as base vertex
    pub fn vertex_offset(&self) -> u32 {
        self.vertex_offset
    }

    pub fn entries(&self) -> &[SurfaceBatch] {
        &self.entries
    }

    /// Total indices baked for the model.
    pub fn index_count(&self) -> u32 {
        self.entries.iter().map(|e| e.index_count).sum()
    }

    /// Draw runs, coalesced once when the model is loaded.
    pub fn texture_runs(&self) -> &[TextureRun] {
        &self.runs
    }
}

/// Maximal run of entries sharing a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRun {
    pub texture: TextureId,
    pub first_index: u32,
    pub index_count: u32,
}

impl TextureRun {
    /// Zero-length runs bind their texture but have nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.index_count == 0
    }
}

/// Indices of the non-excluded surfaces, stably sorted by texture id.
pub fn texture_sorted_order(surfaces: &[BrushSurface]) -> Vec<usize> {
    let mut order: Vec<usize> = surfaces
        .iter()
        .enumerate()
        .filter(|(_, surface)| !surface.flags.is_excluded())
        .map(|(index, _)| index)
        .collect();
    // sort_by_key is stable
    order.sort_by_key(|&index| surfaces[index].texture_id());
    order
}

/// Coalesce batch entries into texture runs.
///
/// Entries without a texture (negative id) are not drawn. They neither
/// start nor end a run, so equal textures on both sides of one belong to
/// the same run.
///
/// # Panics
///
/// Panics if consecutive entries of a run are not contiguous.
pub fn texture_runs(entries: &[SurfaceBatch]) -> Vec<TextureRun> {
    let mut runs: Vec<TextureRun> = Vec::new();

    for entry in entries.iter().filter(|entry| entry.texture >= 0) {
        match runs.last_mut() {
            Some(run) if run.texture == entry.texture => {
                assert_eq!(
                    run.first_index + run.index_count,
                    entry.index_offset,
                    "texture run for {} is not contiguous",
                    entry.texture
                );
                run.index_count += entry.index_count;
            }
            _ => {
                runs.push(TextureRun {
                    texture: entry.texture,
                    first_index: entry.index_offset,
                    index_count: entry.index_count,
                });
            }
        }
    }

    runs
}
