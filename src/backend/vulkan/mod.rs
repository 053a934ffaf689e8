//! Vulkan backend implementation using ash
//!
//! The host renderer owns the device, the render pass and the frame's
//! command buffer. This backend only creates the brush pipeline objects and
//! records commands into whatever command buffer the host hands it.

mod conversion;

use std::collections::HashSet;
use std::ffi::CString;
use std::ops::Range;

use ash::vk;
use ash::vk::Handle;

use crate::backend::traits::*;
use crate::backend::types::*;

use conversion::*;

/// Objects owned by the host renderer that brush pipelines are built against.
#[derive(Debug, Clone, Copy)]
pub struct VulkanRenderTargets {
    /// Render pass the brush pipelines draw in
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    /// Layout of a set holding a single uniform buffer
    pub uniform_set_layout: vk::DescriptorSetLayout,
    /// Layout of a set holding a single combined image sampler
    pub texture_set_layout: vk::DescriptorSetLayout,
}

/// Vulkan backend implementation
pub struct VulkanBackend {
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    targets: VulkanRenderTargets,
    command_buffer: vk::CommandBuffer,

    // Objects created through this backend, destroyed on request
    shader_modules: HashSet<u64>,
    pipeline_layouts: HashSet<u64>,
    pipelines: HashSet<u64>,
}

impl VulkanBackend {
    pub fn new(device: ash::Device, targets: VulkanRenderTargets) -> Self {
        Self {
            device,
            debug_utils: None,
            targets,
            command_buffer: vk::CommandBuffer::null(),
            shader_modules: HashSet::new(),
            pipeline_layouts: HashSet::new(),
            pipelines: HashSet::new(),
        }
    }

    /// Enable object names and command labels via `VK_EXT_debug_utils`.
    pub fn with_debug_utils(mut self, instance: &ash::Instance) -> Self {
        log::debug!("VulkanBackend: debug utils enabled");
        self.debug_utils = Some(ash::ext::debug_utils::Device::new(instance, &self.device));
        self
    }

    /// Get the Vulkan device
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Set the command buffer subsequent commands are recorded into.
    pub fn set_command_buffer(&mut self, command_buffer: vk::CommandBuffer) {
        self.command_buffer = command_buffer;
    }

    /// Get the current command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    fn set_layout(&self, kind: DescriptorSetLayoutKind) -> vk::DescriptorSetLayout {
        match kind {
            DescriptorSetLayoutKind::UniformBuffer => self.targets.uniform_set_layout,
            DescriptorSetLayoutKind::Texture => self.targets.texture_set_layout,
        }
    }

    fn recording(&self) -> bool {
        if self.command_buffer == vk::CommandBuffer::null() {
            log::error!("VulkanBackend: command recorded without a command buffer");
            return false;
        }
        true
    }
}

impl BrushBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan Backend"
    }

    fn create_shader_module(
        &mut self,
        label: &str,
        spirv: &[u32],
    ) -> BackendResult<ShaderModuleHandle> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(spirv);

        let module = unsafe { self.device.create_shader_module(&create_info, None) }
            .map_err(|e| BackendError::ShaderCreationFailed(format!("{label}: {e:?}")))?;

        self.shader_modules.insert(module.as_raw());
        Ok(ShaderModuleHandle(module.as_raw()))
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) {
        if self.shader_modules.remove(&module.0) {
            unsafe {
                self.device
                    .destroy_shader_module(vk::ShaderModule::from_raw(module.0), None)
            };
        }
    }

    fn create_pipeline_layout(
        &mut self,
        sets: &[DescriptorSetLayoutKind],
    ) -> BackendResult<PipelineLayoutHandle> {
        let set_layouts: Vec<vk::DescriptorSetLayout> =
            sets.iter().map(|&kind| self.set_layout(kind)).collect();

        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);

        let layout = unsafe { self.device.create_pipeline_layout(&create_info, None) }
            .map_err(|e| BackendError::PipelineLayoutCreationFailed(format!("{e:?}")))?;

        self.pipeline_layouts.insert(layout.as_raw());
        Ok(PipelineLayoutHandle(layout.as_raw()))
    }

    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutHandle) {
        if self.pipeline_layouts.remove(&layout.0) {
            unsafe {
                self.device
                    .destroy_pipeline_layout(vk::PipelineLayout::from_raw(layout.0), None)
            };
        }
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<PipelineHandle> {
        let label = desc.label.as_deref().unwrap_or("pipeline");
        let entry_point = CString::new(desc.entry_point.as_str()).map_err(|e| {
            BackendError::InvalidParameter(format!(
                "Invalid entry point name (contains null byte): {e}"
            ))
        })?;

        // Fragment specialization constants are packed as consecutive f32s
        let spec_entries: Vec<vk::SpecializationMapEntry> = desc
            .fragment_constants
            .iter()
            .enumerate()
            .map(|(i, constant)| {
                vk::SpecializationMapEntry::default()
                    .constant_id(constant.id)
                    .offset((i * std::mem::size_of::<f32>()) as u32)
                    .size(std::mem::size_of::<f32>())
            })
            .collect();
        let spec_values: Vec<f32> = desc.fragment_constants.iter().map(|c| c.value).collect();
        let spec_info = vk::SpecializationInfo::default()
            .map_entries(&spec_entries)
            .data(bytemuck::cast_slice(spec_values.as_slice()));

        let vertex_stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vk::ShaderModule::from_raw(desc.vertex_shader.0))
            .name(&entry_point);
        let mut fragment_stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(vk::ShaderModule::from_raw(desc.fragment_shader.0))
            .name(&entry_point);
        if !spec_entries.is_empty() {
            fragment_stage = fragment_stage.specialization_info(&spec_info);
        }
        let shader_stages = [vertex_stage, fragment_stage];

        let binding_descriptions: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_layouts
            .iter()
            .enumerate()
            .map(|(i, layout)| {
                vk::VertexInputBindingDescription::default()
                    .binding(i as u32)
                    .stride(layout.array_stride as u32)
                    .input_rate(convert_step_mode(layout.step_mode))
            })
            .collect();

        let attribute_descriptions: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layouts
            .iter()
            .enumerate()
            .flat_map(|(i, layout)| {
                layout.attributes.iter().map(move |attr| {
                    vk::VertexInputAttributeDescription::default()
                        .location(attr.location)
                        .binding(i as u32)
                        .format(convert_vertex_format(attr.format))
                        .offset(attr.offset as u32)
                })
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(convert_topology(desc.primitive_topology))
            .primitive_restart_enable(false);

        // Dynamic viewport and scissor
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(convert_cull_mode(desc.cull_mode))
            .front_face(convert_front_face(desc.front_face))
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test_enabled)
            .depth_write_enable(desc.depth_stencil.depth_write_enabled)
            .depth_compare_op(convert_compare_op(desc.depth_stencil.depth_compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [convert_color_target(&desc.color_target)];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .depth_stencil_state(&depth_stencil_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(vk::PipelineLayout::from_raw(desc.layout.0))
            .render_pass(self.targets.render_pass)
            .subpass(self.targets.subpass);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_, e)| BackendError::PipelineCreationFailed(format!("{label}: {e:?}")))?;

        let pipeline = pipelines[0];
        self.pipelines.insert(pipeline.as_raw());
        Ok(PipelineHandle(pipeline.as_raw()))
    }

    fn destroy_render_pipeline(&mut self, pipeline: PipelineHandle) {
        if self.pipelines.remove(&pipeline.0) {
            unsafe {
                self.device
                    .destroy_pipeline(vk::Pipeline::from_raw(pipeline.0), None)
            };
        }
    }

    fn set_pipeline_name(&mut self, pipeline: PipelineHandle, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };

        let name_info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(vk::Pipeline::from_raw(pipeline.0))
            .object_name(&name);

        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&name_info) } {
            log::warn!("VulkanBackend: failed to name pipeline: {e:?}");
        }
    }

    fn set_render_pipeline(&mut self, pipeline: PipelineHandle) {
        if !self.recording() {
            return;
        }
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk::Pipeline::from_raw(pipeline.0),
            );
        }
    }

    fn set_descriptor_set(
        &mut self,
        layout: PipelineLayoutHandle,
        index: u32,
        set: DescriptorSetHandle,
        dynamic_offsets: &[u32],
    ) {
        if !self.recording() {
            return;
        }
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk::PipelineLayout::from_raw(layout.0),
                index,
                &[vk::DescriptorSet::from_raw(set.0)],
                dynamic_offsets,
            );
        }
    }

    fn set_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) {
        if !self.recording() {
            return;
        }
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                0,
                &[vk::Buffer::from_raw(buffer.0)],
                &[offset],
            );
        }
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        if !self.recording() {
            return;
        }
        unsafe {
            self.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk::Buffer::from_raw(buffer.0),
                offset,
                convert_index_format(format),
            );
        }
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        if !self.recording() {
            return;
        }
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                indices.end - indices.start,
                instances.end - instances.start,
                indices.start,
                base_vertex,
                instances.start,
            );
        }
    }

    fn push_debug_label(&mut self, label: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(label) else {
            return;
        };
        if self.command_buffer == vk::CommandBuffer::null() {
            return;
        }

        let label = vk::DebugUtilsLabelEXT::default().label_name(&name);
        unsafe { debug_utils.cmd_begin_debug_utils_label(self.command_buffer, &label) };
    }

    fn pop_debug_label(&mut self) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        if self.command_buffer == vk::CommandBuffer::null() {
            return;
        }
        unsafe { debug_utils.cmd_end_debug_utils_label(self.command_buffer) };
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        // The device belongs to the host and may already be gone, so leaked
        // objects are only reported.
        let leaked = self.shader_modules.len() + self.pipeline_layouts.len() + self.pipelines.len();
        if leaked > 0 {
            log::warn!(
                "VulkanBackend dropped with {leaked} live objects. \
                 Destroy the pipeline set before dropping the backend."
            );
        }
    }
}
