//! Brush renderer error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::brush::PipelineKind;

/// Errors reported by the brush renderer.
///
/// Everything here is recoverable at the call site: a failed model load
/// leaves the renderer usable, a failed `begin_frame` skips brush drawing for
/// that frame. Contract violations (unknown render mode, broken index
/// contiguity) are panics instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrushError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Failed to create {kind:?} brush pipeline: {source}")]
    PipelineCreation {
        kind: PipelineKind,
        #[source]
        source: BackendError,
    },
    #[error("Failed to load shader {name}: {reason}")]
    ShaderLoad { name: String, reason: String },
    #[error("Ran out of buffer vertex space ({requested} vertices requested)")]
    OutOfVertexSpace { requested: u32 },
    #[error("Ran out of buffer index space ({requested} indices requested)")]
    OutOfIndexSpace { requested: u32 },
    #[error("Model {model} indices don't fit into 16 bits ({vertices} vertices)")]
    IndexOverflow { model: String, vertices: u32 },
    #[error("Don't have a lightmap texture")]
    MissingLightmapAtlas,
}

pub type BrushResult<T> = Result<T, BrushError>;
