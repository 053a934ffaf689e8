//! Brush model baking, batching and drawing.

pub mod bake;
pub mod batch;
pub mod pipelines;
pub mod renderer;
pub mod shader;

pub use bake::{bake_surfaces, fan_index_count};
pub use batch::{texture_runs, texture_sorted_order, BrushModelCache, SurfaceBatch, TextureRun};
pub use pipelines::{with_shader_modules, PipelineKind, PipelineSet, RenderMode};
pub use renderer::{BrushRenderer, BrushStatistics, FrameState, FrameStatistics, LoadOutcome};
#[cfg(not(target_arch = "wasm32"))]
pub use shader::DirectoryShaderLoader;
pub use shader::{MemoryShaderLoader, ShaderLoader};
