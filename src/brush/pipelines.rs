//! Brush render modes and the pipeline set built for them.

use super::shader::ShaderLoader;
use crate::backend::*;
use crate::error::{BrushError, BrushResult};
use crate::BrushConfig;

/// Render mode requested by the host for an entity.
///
/// Discriminants are the host's raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RenderMode {
    Normal = 0,
    TransColor = 1,
    TransTexture = 2,
    Glow = 3,
    TransAlpha = 4,
    TransAdd = 5,
}

impl RenderMode {
    pub const ALL: [RenderMode; 6] = [
        RenderMode::Normal,
        RenderMode::TransColor,
        RenderMode::TransTexture,
        RenderMode::Glow,
        RenderMode::TransAlpha,
        RenderMode::TransAdd,
    ];

    pub fn pipeline_kind(self) -> PipelineKind {
        match self {
            RenderMode::Normal => PipelineKind::Opaque,
            RenderMode::TransColor => PipelineKind::Blended,
            RenderMode::TransAdd => PipelineKind::Additive,
            RenderMode::TransAlpha => PipelineKind::AlphaTest,
            RenderMode::Glow | RenderMode::TransTexture => PipelineKind::Glow,
        }
    }
}

impl TryFrom<i32> for RenderMode {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|mode| *mode as i32 == value)
            .ok_or(value)
    }
}

/// Distinct pipeline object a render mode maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Opaque,
    Blended,
    Additive,
    AlphaTest,
    Glow,
}

impl PipelineKind {
    pub const COUNT: usize = 5;

    pub const ALL: [PipelineKind; Self::COUNT] = [
        PipelineKind::Opaque,
        PipelineKind::Blended,
        PipelineKind::Additive,
        PipelineKind::AlphaTest,
        PipelineKind::Glow,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn depth_write(self) -> bool {
        matches!(
            self,
            PipelineKind::Opaque | PipelineKind::Blended | PipelineKind::AlphaTest
        )
    }

    pub fn blend(self) -> Option<BlendState> {
        match self {
            PipelineKind::Opaque | PipelineKind::AlphaTest => None,
            PipelineKind::Blended | PipelineKind::Glow => Some(BlendState::alpha_blending()),
            PipelineKind::Additive => Some(BlendState::additive()),
        }
    }

    /// Debug name attached to the pipeline object.
    pub fn debug_name(self) -> String {
        format!("brush {:?}", self)
    }

    /// Full pipeline description for this kind.
    pub fn descriptor(
        self,
        layout: PipelineLayoutHandle,
        vertex_shader: ShaderModuleHandle,
        fragment_shader: ShaderModuleHandle,
        config: &BrushConfig,
    ) -> RenderPipelineDescriptor {
        let fragment_constants = if self == PipelineKind::AlphaTest {
            vec![SpecializationConstant {
                id: ALPHA_TEST_CONSTANT_ID,
                value: config.alpha_test_threshold,
            }]
        } else {
            Vec::new()
        };

        RenderPipelineDescriptor {
            label: Some(self.debug_name()),
            layout,
            vertex_shader,
            fragment_shader,
            entry_point: "main".to_string(),
            fragment_constants,
            vertex_layouts: vec![BrushVertex::layout()],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: config.cull_mode,
            depth_stencil: DepthStencilState {
                depth_test_enabled: true,
                depth_write_enabled: self.depth_write(),
                depth_compare: config.depth_compare,
            },
            color_target: ColorTargetState {
                blend: self.blend(),
                write_mask: ColorWrites::all(),
            },
        }
    }
}

/// Fragment specialization constant holding the alpha-test threshold.
pub const ALPHA_TEST_CONSTANT_ID: u32 = 0;

/// Descriptor set slots of the shared brush pipeline layout.
pub const UNIFORM_SET: u32 = 0;
pub const MATERIAL_TEXTURE_SET: u32 = 1;
pub const LIGHTMAP_SET: u32 = 2;

const LAYOUT_SETS: [DescriptorSetLayoutKind; 3] = [
    DescriptorSetLayoutKind::UniformBuffer,
    DescriptorSetLayoutKind::Texture,
    DescriptorSetLayoutKind::Texture,
];

/// Load the configured vertex and fragment shaders, run `f` with them, and
/// destroy the modules whatever `f` returns.
pub fn with_shader_modules<B, T, F>(
    backend: &mut B,
    shaders: &dyn ShaderLoader,
    config: &BrushConfig,
    f: F,
) -> BrushResult<T>
where
    B: BrushBackend + ?Sized,
    F: FnOnce(&mut B, ShaderModuleHandle, ShaderModuleHandle) -> BrushResult<T>,
{
    let vertex_code = shaders.load_spirv(&config.vertex_shader)?;
    let fragment_code = shaders.load_spirv(&config.fragment_shader)?;

    let vertex = backend.create_shader_module(&config.vertex_shader, &vertex_code)?;
    let fragment = match backend.create_shader_module(&config.fragment_shader, &fragment_code) {
        Ok(module) => module,
        Err(e) => {
            backend.destroy_shader_module(vertex);
            return Err(e.into());
        }
    };

    let result = f(backend, vertex, fragment);

    backend.destroy_shader_module(fragment);
    backend.destroy_shader_module(vertex);
    result
}

/// One pipeline per [`PipelineKind`] sharing a single layout.
#[derive(Debug)]
pub struct PipelineSet {
    layout: PipelineLayoutHandle,
    pipelines: [PipelineHandle; PipelineKind::COUNT],
}

impl PipelineSet {
    pub fn create<B>(
        backend: &mut B,
        shaders: &dyn ShaderLoader,
        config: &BrushConfig,
    ) -> BrushResult<Self>
    where
        B: BrushBackend + ?Sized,
    {
        let layout = backend.create_pipeline_layout(&LAYOUT_SETS)?;

        let pipelines = with_shader_modules(backend, shaders, config, |backend, vs, fs| {
            Self::create_pipelines(backend, layout, vs, fs, config)
        });

        match pipelines {
            Ok(pipelines) => {
                log::debug!(
                    "Created {} brush pipelines on {}",
                    PipelineKind::COUNT,
                    backend.name()
                );
                Ok(Self { layout, pipelines })
            }
            Err(e) => {
                backend.destroy_pipeline_layout(layout);
                Err(e)
            }
        }
    }

    fn create_pipelines<B>(
        backend: &mut B,
        layout: PipelineLayoutHandle,
        vertex: ShaderModuleHandle,
        fragment: ShaderModuleHandle,
        config: &BrushConfig,
    ) -> BrushResult<[PipelineHandle; PipelineKind::COUNT]>
    where
        B: BrushBackend + ?Sized,
    {
        let mut pipelines = [PipelineHandle::from_raw(0); PipelineKind::COUNT];

        for (built, kind) in PipelineKind::ALL.into_iter().enumerate() {
            let desc = kind.descriptor(layout, vertex, fragment, config);
            match backend.create_render_pipeline(&desc) {
                Ok(pipeline) => {
                    if config.debug_labels {
                        backend.set_pipeline_name(pipeline, &kind.debug_name());
                    }
                    pipelines[kind.index()] = pipeline;
                }
                Err(source) => {
                    log::error!("Failed to create {:?} brush pipeline: {}", kind, source);
                    for pipeline in &pipelines[..built] {
                        backend.destroy_render_pipeline(*pipeline);
                    }
                    return Err(BrushError::PipelineCreation { kind, source });
                }
            }
        }

        Ok(pipelines)
    }

    pub fn layout(&self) -> PipelineLayoutHandle {
        self.layout
    }

    pub fn get(&self, kind: PipelineKind) -> PipelineHandle {
        self.pipelines[kind.index()]
    }

    pub fn destroy<B>(self, backend: &mut B)
    where
        B: BrushBackend + ?Sized,
    {
        for pipeline in self.pipelines {
            backend.destroy_render_pipeline(pipeline);
        }
        backend.destroy_pipeline_layout(self.layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::MemoryShaderLoader;
    use rstest::rstest;

    fn shaders() -> MemoryShaderLoader {
        MemoryShaderLoader::new()
            .with_shader("brush.vert.spv", vec![0x0723_0203, 1])
            .with_shader("brush.frag.spv", vec![0x0723_0203, 2])
    }

    #[rstest]
    #[case(0, RenderMode::Normal, PipelineKind::Opaque)]
    #[case(1, RenderMode::TransColor, PipelineKind::Blended)]
    #[case(2, RenderMode::TransTexture, PipelineKind::Glow)]
    #[case(3, RenderMode::Glow, PipelineKind::Glow)]
    #[case(4, RenderMode::TransAlpha, PipelineKind::AlphaTest)]
    #[case(5, RenderMode::TransAdd, PipelineKind::Additive)]
    fn test_render_mode_mapping(
        #[case] raw: i32,
        #[case] mode: RenderMode,
        #[case] kind: PipelineKind,
    ) {
        assert_eq!(RenderMode::try_from(raw), Ok(mode));
        assert_eq!(mode.pipeline_kind(), kind);
    }

    #[test]
    fn test_unknown_render_mode() {
        assert_eq!(RenderMode::try_from(6), Err(6));
        assert_eq!(RenderMode::try_from(-1), Err(-1));
    }

    #[rstest]
    #[case(PipelineKind::Opaque, true, None)]
    #[case(PipelineKind::Blended, true, Some(BlendState::alpha_blending()))]
    #[case(PipelineKind::Additive, false, Some(BlendState::additive()))]
    #[case(PipelineKind::AlphaTest, true, None)]
    #[case(PipelineKind::Glow, false, Some(BlendState::alpha_blending()))]
    fn test_pipeline_state(
        #[case] kind: PipelineKind,
        #[case] depth_write: bool,
        #[case] blend: Option<BlendState>,
    ) {
        let config = BrushConfig::default();
        let h = |raw| ShaderModuleHandle::from_raw(raw);
        let desc = kind.descriptor(PipelineLayoutHandle::from_raw(1), h(2), h(3), &config);

        assert!(desc.depth_stencil.depth_test_enabled);
        assert_eq!(desc.depth_stencil.depth_compare, CompareFunction::Less);
        assert_eq!(desc.depth_stencil.depth_write_enabled, depth_write);
        assert_eq!(desc.cull_mode, CullMode::Front);
        assert_eq!(desc.color_target.blend, blend);
        assert_eq!(desc.vertex_layouts, vec![BrushVertex::layout()]);
        assert_eq!(
            desc.fragment_constants.is_empty(),
            kind != PipelineKind::AlphaTest
        );
    }

    #[test]
    fn test_alpha_test_threshold_is_configurable() {
        let config = BrushConfig::default().with_alpha_test_threshold(0.5);
        let h = |raw| ShaderModuleHandle::from_raw(raw);
        let desc = PipelineKind::AlphaTest.descriptor(PipelineLayoutHandle::from_raw(1), h(2), h(3), &config);

        assert_eq!(
            desc.fragment_constants,
            vec![SpecializationConstant { id: 0, value: 0.5 }]
        );
    }

    #[test]
    fn test_create_and_destroy() {
        let mut backend = RecordingBackend::new();
        let config = BrushConfig::default().with_debug_labels(true);
        let set = PipelineSet::create(&mut backend, &shaders(), &config).unwrap();

        assert_eq!(backend.live_pipeline_count(), PipelineKind::COUNT);
        assert_eq!(backend.live_shader_module_count(), 0);
        assert_eq!(backend.destroyed_shader_module_count(), 2);
        assert_eq!(backend.layout_sets(set.layout()), Some(&LAYOUT_SETS[..]));
        assert_eq!(
            backend.pipeline_name(set.get(PipelineKind::Opaque)),
            Some("brush Opaque")
        );

        set.destroy(&mut backend);
        assert_eq!(backend.live_pipeline_count(), 0);
        assert_eq!(backend.live_layout_count(), 0);
    }

    #[test]
    fn test_failure_releases_everything() {
        let mut backend = RecordingBackend::new().fail_pipeline_creation_at(3);
        let err = PipelineSet::create(&mut backend, &shaders(), &BrushConfig::default()).unwrap_err();

        assert!(matches!(
            err,
            BrushError::PipelineCreation {
                kind: PipelineKind::AlphaTest,
                ..
            }
        ));
        assert_eq!(backend.live_pipeline_count(), 0);
        assert_eq!(backend.live_layout_count(), 0);
        assert_eq!(backend.live_shader_module_count(), 0);
        assert_eq!(backend.destroyed_shader_module_count(), 2);
    }

    #[test]
    fn test_missing_shader_creates_nothing() {
        let mut backend = RecordingBackend::new();
        let shaders = MemoryShaderLoader::new().with_shader("brush.vert.spv", vec![0x0723_0203]);
        let err = PipelineSet::create(&mut backend, &shaders, &BrushConfig::default()).unwrap_err();

        assert!(matches!(err, BrushError::ShaderLoad { .. }));
        assert_eq!(backend.live_layout_count(), 0);
        assert_eq!(backend.live_shader_module_count(), 0);
    }
}
