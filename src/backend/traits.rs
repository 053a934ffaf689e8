//! Core backend abstraction traits
//!
//! These traits define the interface that the Vulkan and recording backends
//! implement. Every command-recording method appends to the backend's
//! current command stream; nothing here blocks.

use crate::backend::types::*;
use std::ops::Range;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create shader module: {0}")]
    ShaderCreationFailed(String),
    #[error("Failed to create pipeline layout: {0}")]
    PipelineLayoutCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! raw_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Wrap a raw backend handle value.
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }
    };
}

raw_handle!(
    /// Handle to a GPU buffer
    BufferHandle
);
raw_handle!(
    /// Handle to a render pipeline
    PipelineHandle
);
raw_handle!(
    /// Handle to a pipeline layout
    PipelineLayoutHandle
);
raw_handle!(
    /// Handle to a compiled shader module
    ShaderModuleHandle
);
raw_handle!(
    /// Handle to a descriptor set owned by the host renderer
    DescriptorSetHandle
);

/// GPU backend used by the brush renderer.
pub trait BrushBackend {
    /// Backend name for diagnostics
    fn name(&self) -> &'static str;

    // Object creation

    /// Create a shader module from SPIR-V words
    fn create_shader_module(
        &mut self,
        label: &str,
        spirv: &[u32],
    ) -> BackendResult<ShaderModuleHandle>;

    /// Destroy a shader module
    fn destroy_shader_module(&mut self, module: ShaderModuleHandle);

    /// Create a pipeline layout with one descriptor set per entry
    fn create_pipeline_layout(
        &mut self,
        sets: &[DescriptorSetLayoutKind],
    ) -> BackendResult<PipelineLayoutHandle>;

    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutHandle);

    /// Create a render pipeline
    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<PipelineHandle>;

    /// Destroy a render pipeline
    fn destroy_render_pipeline(&mut self, pipeline: PipelineHandle);

    /// Attach a debug name to a pipeline. No-op when debug utils are off.
    fn set_pipeline_name(&mut self, pipeline: PipelineHandle, name: &str);

    // Command recording

    /// Set the render pipeline
    fn set_render_pipeline(&mut self, pipeline: PipelineHandle);

    /// Bind a descriptor set at `index` of `layout`
    fn set_descriptor_set(
        &mut self,
        layout: PipelineLayoutHandle,
        index: u32,
        set: DescriptorSetHandle,
        dynamic_offsets: &[u32],
    );

    /// Set vertex buffer
    fn set_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64);

    /// Set index buffer
    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat);

    /// Draw indexed primitives
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);

    /// Open a debug label region
    fn push_debug_label(&mut self, label: &str);

    /// Close the innermost debug label region
    fn pop_debug_label(&mut self);
}
