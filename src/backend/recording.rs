//! Recording GPU backend for testing and headless runs.
//!
//! This backend doesn't talk to a GPU. Object creation hands out fresh
//! handles and every recorded command is kept in order, so callers can
//! inspect exactly what would have been submitted.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use super::traits::*;
use super::types::*;

/// A command captured by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BindPipeline(PipelineHandle),
    BindDescriptorSet {
        layout: PipelineLayoutHandle,
        index: u32,
        set: DescriptorSetHandle,
        dynamic_offsets: Vec<u32>,
    },
    BindVertexBuffer {
        buffer: BufferHandle,
        offset: u64,
    },
    BindIndexBuffer {
        buffer: BufferHandle,
        offset: u64,
        format: IndexFormat,
    },
    DrawIndexed {
        first_index: u32,
        index_count: u32,
        base_vertex: i32,
    },
    PushDebugLabel(String),
    PopDebugLabel,
}

/// Recording backend.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u64,
    commands: Vec<RecordedCommand>,
    shader_modules: HashMap<ShaderModuleHandle, String>,
    layouts: HashMap<PipelineLayoutHandle, Vec<DescriptorSetLayoutKind>>,
    pipelines: HashMap<PipelineHandle, RenderPipelineDescriptor>,
    pipeline_names: HashMap<PipelineHandle, String>,
    destroyed_shader_modules: HashSet<ShaderModuleHandle>,
    pipelines_created: usize,
    fail_pipeline_at: Option<usize>,
}

impl RecordingBackend {
    /// Create a new recording backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th pipeline creation (zero based) fail.
    pub fn fail_pipeline_creation_at(mut self, n: usize) -> Self {
        self.fail_pipeline_at = Some(n);
        self
    }

    fn next_handle(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// All commands recorded so far.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Drop recorded commands, keeping created objects.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded indexed draws as `(first_index, index_count, base_vertex)`.
    pub fn draw_calls(&self) -> Vec<(u32, u32, i32)> {
        self.commands
            .iter()
            .filter_map(|cmd| match *cmd {
                RecordedCommand::DrawIndexed {
                    first_index,
                    index_count,
                    base_vertex,
                } => Some((first_index, index_count, base_vertex)),
                _ => None,
            })
            .collect()
    }

    /// Pipelines bound, in order.
    pub fn pipeline_binds(&self) -> Vec<PipelineHandle> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::BindPipeline(pipeline) => Some(*pipeline),
                _ => None,
            })
            .collect()
    }

    /// Descriptor sets bound at `index`, in order.
    pub fn descriptor_binds(&self, index: u32) -> Vec<DescriptorSetHandle> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::BindDescriptorSet { index: i, set, .. } if *i == index => {
                    Some(*set)
                }
                _ => None,
            })
            .collect()
    }

    /// Descriptor of a live pipeline.
    pub fn pipeline_descriptor(&self, pipeline: PipelineHandle) -> Option<&RenderPipelineDescriptor> {
        self.pipelines.get(&pipeline)
    }

    /// Debug name given to a pipeline, if any.
    pub fn pipeline_name(&self, pipeline: PipelineHandle) -> Option<&str> {
        self.pipeline_names.get(&pipeline).map(String::as_str)
    }

    /// Descriptor set kinds of a live pipeline layout.
    pub fn layout_sets(&self, layout: PipelineLayoutHandle) -> Option<&[DescriptorSetLayoutKind]> {
        self.layouts.get(&layout).map(Vec::as_slice)
    }

    pub fn live_pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn live_layout_count(&self) -> usize {
        self.layouts.len()
    }

    pub fn live_shader_module_count(&self) -> usize {
        self.shader_modules.len()
    }

    pub fn destroyed_shader_module_count(&self) -> usize {
        self.destroyed_shader_modules.len()
    }
}

impl BrushBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "Recording Backend"
    }

    fn create_shader_module(
        &mut self,
        label: &str,
        spirv: &[u32],
    ) -> BackendResult<ShaderModuleHandle> {
        if spirv.is_empty() {
            return Err(BackendError::ShaderCreationFailed(format!(
                "{label}: empty SPIR-V"
            )));
        }
        let handle = ShaderModuleHandle(self.next_handle());
        log::trace!("RecordingBackend: creating shader module {label} ({} words)", spirv.len());
        self.shader_modules.insert(handle, label.to_string());
        Ok(handle)
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) {
        if self.shader_modules.remove(&module).is_some() {
            self.destroyed_shader_modules.insert(module);
        }
    }

    fn create_pipeline_layout(
        &mut self,
        sets: &[DescriptorSetLayoutKind],
    ) -> BackendResult<PipelineLayoutHandle> {
        let handle = PipelineLayoutHandle(self.next_handle());
        self.layouts.insert(handle, sets.to_vec());
        Ok(handle)
    }

    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutHandle) {
        self.layouts.remove(&layout);
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<PipelineHandle> {
        let attempt = self.pipelines_created;
        self.pipelines_created += 1;

        if self.fail_pipeline_at == Some(attempt) {
            return Err(BackendError::PipelineCreationFailed(format!(
                "{}: injected failure",
                desc.label.as_deref().unwrap_or("pipeline")
            )));
        }
        if !self.layouts.contains_key(&desc.layout) {
            return Err(BackendError::InvalidParameter("unknown pipeline layout".into()));
        }
        for module in [desc.vertex_shader, desc.fragment_shader] {
            if !self.shader_modules.contains_key(&module) {
                return Err(BackendError::InvalidParameter(format!(
                    "shader module {module:?} is not alive"
                )));
            }
        }

        let handle = PipelineHandle(self.next_handle());
        log::trace!("RecordingBackend: creating pipeline {:?}", desc.label);
        self.pipelines.insert(handle, desc.clone());
        Ok(handle)
    }

    fn destroy_render_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.remove(&pipeline);
        self.pipeline_names.remove(&pipeline);
    }

    fn set_pipeline_name(&mut self, pipeline: PipelineHandle, name: &str) {
        self.pipeline_names.insert(pipeline, name.to_string());
    }

    fn set_render_pipeline(&mut self, pipeline: PipelineHandle) {
        self.commands.push(RecordedCommand::BindPipeline(pipeline));
    }

    fn set_descriptor_set(
        &mut self,
        layout: PipelineLayoutHandle,
        index: u32,
        set: DescriptorSetHandle,
        dynamic_offsets: &[u32],
    ) {
        self.commands.push(RecordedCommand::BindDescriptorSet {
            layout,
            index,
            set,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn set_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) {
        self.commands
            .push(RecordedCommand::BindVertexBuffer { buffer, offset });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        self.commands.push(RecordedCommand::BindIndexBuffer {
            buffer,
            offset,
            format,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, _instances: Range<u32>) {
        self.commands.push(RecordedCommand::DrawIndexed {
            first_index: indices.start,
            index_count: indices.end - indices.start,
            base_vertex,
        });
    }

    fn push_debug_label(&mut self, label: &str) {
        self.commands
            .push(RecordedCommand::PushDebugLabel(label.to_string()));
    }

    fn pop_debug_label(&mut self) {
        self.commands.push(RecordedCommand::PopDebugLabel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_draws_in_order() {
        let mut backend = RecordingBackend::new();
        backend.draw_indexed(0..6, 4, 0..1);
        backend.draw_indexed(6..15, 4, 0..1);

        assert_eq!(backend.draw_calls(), vec![(0, 6, 4), (6, 9, 4)]);
        backend.clear_commands();
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_shader_module_lifecycle() {
        let mut backend = RecordingBackend::new();
        let module = backend.create_shader_module("brush.vert.spv", &[0x0723_0203]).unwrap();
        assert_eq!(backend.live_shader_module_count(), 1);

        backend.destroy_shader_module(module);
        backend.destroy_shader_module(module);
        assert_eq!(backend.live_shader_module_count(), 0);
        assert_eq!(backend.destroyed_shader_module_count(), 1);
    }

    #[test]
    fn test_empty_spirv_is_rejected() {
        let mut backend = RecordingBackend::new();
        assert!(matches!(
            backend.create_shader_module("empty", &[]),
            Err(BackendError::ShaderCreationFailed(_))
        ));
    }
}
