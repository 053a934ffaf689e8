//! Common types shared between backends

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use super::traits::{PipelineLayoutHandle, ShaderModuleHandle};

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
        }
    }
}

/// Vertex attribute description
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Vertex buffer layout
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStepMode {
    Vertex,
}

/// Brush surface vertex: world position, material UV and lightmap atlas UV
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct BrushVertex {
    pub position: Vec3,
    pub material_uv: Vec2,
    pub lightmap_uv: Vec2,
}

impl BrushVertex {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout {
            array_stride: Self::STRIDE as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: VertexFormat::Float32x3,
                    offset: std::mem::offset_of!(BrushVertex, position) as u64,
                },
                VertexAttribute {
                    location: 1,
                    format: VertexFormat::Float32x2,
                    offset: std::mem::offset_of!(BrushVertex, material_uv) as u64,
                },
                VertexAttribute {
                    location: 2,
                    format: VertexFormat::Float32x2,
                    offset: std::mem::offset_of!(BrushVertex, lightmap_uv) as u64,
                },
            ],
        }
    }
}

/// Index format. Brush geometry is always indexed with 16-bit indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
}

impl IndexFormat {
    pub fn size(&self) -> u32 {
        match self {
            IndexFormat::Uint16 => 2,
        }
    }
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
}

/// Front face winding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Ccw,
    Cw,
}

/// Cull mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Compare function for depth/stencil
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilState {
    pub depth_test_enabled: bool,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    Src,
    OneMinusSrc,
    SrcAlpha,
    OneMinusSrcAlpha,
    Dst,
    OneMinusDst,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOperation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend component state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl Default for BlendComponent {
    fn default() -> Self {
        Self {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::Zero,
            operation: BlendOperation::Add,
        }
    }
}

/// Blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Same factors for color and alpha channels.
    pub fn uniform(component: BlendComponent) -> Self {
        Self {
            color: component,
            alpha: component,
        }
    }

    pub fn alpha_blending() -> Self {
        Self::uniform(BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        })
    }

    pub fn additive() -> Self {
        Self::uniform(BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            operation: BlendOperation::Add,
        })
    }
}

bitflags! {
    /// Color channels written by a pipeline. Bit values match Vulkan's
    /// color component flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u32 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTargetState {
    pub blend: Option<BlendState>,
    pub write_mask: ColorWrites,
}

/// A 32-bit float specialization constant baked into a shader stage at
/// pipeline creation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecializationConstant {
    pub id: u32,
    pub value: f32,
}

/// Kind of descriptor set bound at a pipeline layout slot.
///
/// The concrete set layouts are owned by the host renderer; the backend maps
/// each kind onto its own layout object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorSetLayoutKind {
    UniformBuffer,
    Texture,
}

/// Render pipeline descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    pub layout: PipelineLayoutHandle,
    pub vertex_shader: ShaderModuleHandle,
    pub fragment_shader: ShaderModuleHandle,
    pub entry_point: String,
    pub fragment_constants: Vec<SpecializationConstant>,
    pub vertex_layouts: Vec<VertexBufferLayout>,
    pub primitive_topology: PrimitiveTopology,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    pub depth_stencil: DepthStencilState,
    pub color_target: ColorTargetState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brush_vertex_layout_matches_struct() {
        let layout = BrushVertex::layout();
        assert_eq!(layout.array_stride, 28);
        assert_eq!(BrushVertex::STRIDE, 28);

        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 20]);

        let end = layout
            .attributes
            .iter()
            .map(|a| a.offset + a.format.size())
            .max();
        assert_eq!(end, Some(layout.array_stride));
    }

    #[test]
    fn test_blend_presets_apply_to_alpha_channel() {
        let blend = BlendState::alpha_blending();
        assert_eq!(blend.color, blend.alpha);
        assert_eq!(blend.color.src_factor, BlendFactor::SrcAlpha);
        assert_eq!(blend.color.dst_factor, BlendFactor::OneMinusSrcAlpha);

        let add = BlendState::additive();
        assert_eq!(add.alpha.src_factor, BlendFactor::One);
        assert_eq!(add.alpha.dst_factor, BlendFactor::One);
    }

    #[test]
    fn test_color_writes_all_channels() {
        let all = ColorWrites::all();
        assert_eq!(all.bits(), 0xF);
        assert_eq!(
            ColorWrites::RED | ColorWrites::GREEN | ColorWrites::BLUE | ColorWrites::ALPHA,
            all
        );
        assert!(!all.difference(ColorWrites::ALPHA).contains(ColorWrites::ALPHA));
    }
}
