//! Per-map model cache and per-frame brush drawing.

use std::collections::HashMap;

use super::bake::bake_surfaces;
use super::batch::BrushModelCache;
use super::pipelines::{
    PipelineKind, PipelineSet, RenderMode, LIGHTMAP_SET, MATERIAL_TEXTURE_SET, UNIFORM_SET,
};
use super::shader::ShaderLoader;
use crate::backend::{BrushBackend, IndexFormat};
use crate::buffer::BufferArena;
use crate::error::{BrushError, BrushResult};
use crate::host::{
    LightmapAtlas, ModelId, SurfaceSource, TextureRegistry, UniformBindings,
};
use crate::BrushConfig;

/// Geometry totals accumulated across loaded models.
///
/// `num_indices` counts the indices actually written, `3 * (edges - 2)` per
/// polygon, so it always equals the sum of the models' batch index counts.
/// Engine-side counters that budget `3 * (edges - 1)` per polygon report
/// higher numbers for the same map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrushStatistics {
    pub num_vertices: u32,
    /// Emitted triangle-list indices
    pub num_indices: u32,
}

/// Work recorded since the last `begin_frame`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    pub models: u32,
    pub draw_calls: u32,
    pub pipeline_binds: u32,
    pub indices: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    FrameBound,
    Drawing,
}

/// Result of a successful [`BrushRenderer::load_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    AlreadyLoaded,
}

/// Brush model renderer.
///
/// Owns the brush pipelines and the cache of baked models. Geometry lives in
/// the host's shared [`BufferArena`].
pub struct BrushRenderer {
    config: BrushConfig,
    pipelines: PipelineSet,
    models: HashMap<ModelId, BrushModelCache>,
    stats: BrushStatistics,
    frame: FrameStatistics,
    state: FrameState,
    bound_pipeline: Option<PipelineKind>,
}

impl BrushRenderer {
    pub fn initialize<B>(
        backend: &mut B,
        shaders: &dyn ShaderLoader,
        config: BrushConfig,
    ) -> BrushResult<Self>
    where
        B: BrushBackend + ?Sized,
    {
        let pipelines = PipelineSet::create(backend, shaders, &config)?;
        log::info!("Brush renderer initialized on {}", backend.name());

        Ok(Self {
            config,
            pipelines,
            models: HashMap::new(),
            stats: BrushStatistics::default(),
            frame: FrameStatistics::default(),
            state: FrameState::Idle,
            bound_pipeline: None,
        })
    }

    /// Destroy the pipelines. Cached models are dropped with the renderer.
    pub fn shutdown<B>(self, backend: &mut B)
    where
        B: BrushBackend + ?Sized,
    {
        self.pipelines.destroy(backend);
        log::debug!("Brush renderer shut down ({} models cached)", self.models.len());
    }

    pub fn config(&self) -> &BrushConfig {
        &self.config
    }

    pub fn pipelines(&self) -> &PipelineSet {
        &self.pipelines
    }

    /// Bake `model` into `arena` and remember it as `model_id`.
    ///
    /// Loading the same id twice is a no-op.
    pub fn load_model(
        &mut self,
        model_id: ModelId,
        model: &dyn SurfaceSource,
        arena: &mut dyn BufferArena,
        lightmaps: &mut dyn LightmapAtlas,
    ) -> BrushResult<LoadOutcome> {
        if self.models.contains_key(&model_id) {
            log::warn!("Model {} was already loaded", model.name());
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        let cache = match bake_surfaces(model, arena, lightmaps, &mut self.stats) {
            Ok(cache) => cache,
            Err(e) => {
                log::error!("Model {} was not loaded: {}", model.name(), e);
                return Err(e);
            }
        };

        log::info!(
            "Model {} loaded surfaces: {} (of {}); total vertices: {}, total indices: {}",
            model.name(),
            cache.entries().len(),
            model.surfaces().len(),
            self.stats.num_vertices,
            self.stats.num_indices
        );
        log::debug!(
            "Model {}: vertex offset {}, {} indices",
            model.name(),
            cache.vertex_offset(),
            cache.index_count()
        );

        self.models.insert(model_id, cache);
        Ok(LoadOutcome::Loaded)
    }

    /// Forget a model's cache record. Its arena space is reclaimed only by
    /// resetting the arena.
    pub fn release_model(&mut self, model_id: ModelId) -> bool {
        self.models.remove(&model_id).is_some()
    }

    pub fn is_loaded(&self, model_id: ModelId) -> bool {
        self.models.contains_key(&model_id)
    }

    pub fn model_cache(&self, model_id: ModelId) -> Option<&BrushModelCache> {
        self.models.get(&model_id)
    }

    /// Reset the aggregate vertex and index counters for a new map.
    pub fn clear_statistics(&mut self) {
        self.stats = BrushStatistics::default();
    }

    pub fn statistics(&self) -> BrushStatistics {
        self.stats
    }

    pub fn frame_statistics(&self) -> FrameStatistics {
        self.frame
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    /// Bind the shared geometry buffers and the lightmap atlas.
    ///
    /// On error the frame is not started and `draw_model` calls are skipped.
    pub fn begin_frame<B>(
        &mut self,
        backend: &mut B,
        arena: &dyn BufferArena,
        textures: &dyn TextureRegistry,
        lightmaps: &dyn LightmapAtlas,
    ) -> BrushResult<()>
    where
        B: BrushBackend + ?Sized,
    {
        if self.state != FrameState::Idle {
            log::warn!("begin_frame called without end_frame");
        }

        let Some(lightmap) = lightmaps
            .atlas_texture()
            .and_then(|texture| textures.texture_descriptor(texture))
        else {
            log::error!("Don't have a lightmap texture");
            self.state = FrameState::Idle;
            return Err(BrushError::MissingLightmapAtlas);
        };

        let buffer = arena.buffer();
        backend.set_vertex_buffer(buffer, 0);
        backend.set_index_buffer(buffer, 0, IndexFormat::Uint16);
        backend.set_descriptor_set(self.pipelines.layout(), LIGHTMAP_SET, lightmap, &[]);

        self.bound_pipeline = None;
        self.frame = FrameStatistics::default();
        self.state = FrameState::FrameBound;
        Ok(())
    }

    /// Record the draws for one model instance.
    ///
    /// # Panics
    ///
    /// Panics if `render_mode` is not a known [`RenderMode`].
    pub fn draw_model<B>(
        &mut self,
        backend: &mut B,
        model_id: ModelId,
        render_mode: i32,
        uniform_index: u32,
        textures: &dyn TextureRegistry,
        uniforms: &dyn UniformBindings,
    ) where
        B: BrushBackend + ?Sized,
    {
        let mode = match RenderMode::try_from(render_mode) {
            Ok(mode) => mode,
            Err(raw) => panic!("Unexpected render mode {}", raw),
        };

        if self.state == FrameState::Idle {
            log::error!("draw_model({:?}) outside of a frame", model_id);
            return;
        }

        let Some(cache) = self.models.get(&model_id) else {
            log::error!("Model {:?} wasn't loaded", model_id);
            return;
        };

        let Some(uniform) = uniforms.uniform_binding(uniform_index) else {
            log::error!("No uniform slot {} for model {:?}", uniform_index, model_id);
            return;
        };

        if self.config.debug_labels {
            backend.push_debug_label(&format!("brush {}", model_id.0));
        }

        let kind = mode.pipeline_kind();
        if self.bound_pipeline != Some(kind) {
            backend.set_render_pipeline(self.pipelines.get(kind));
            self.bound_pipeline = Some(kind);
            self.frame.pipeline_binds += 1;
        }

        let layout = self.pipelines.layout();
        backend.set_descriptor_set(layout, UNIFORM_SET, uniform.set, &[uniform.dynamic_offset]);

        let base_vertex = cache.vertex_offset() as i32;
        for run in cache.texture_runs() {
            let Some(texture) = textures.texture_descriptor(run.texture) else {
                log::warn!("No descriptor for texture {}", run.texture);
                continue;
            };
            backend.set_descriptor_set(layout, MATERIAL_TEXTURE_SET, texture, &[]);

            if run.is_empty() {
                continue;
            }
            backend.draw_indexed(
                run.first_index..run.first_index + run.index_count,
                base_vertex,
                0..1,
            );
            self.frame.draw_calls += 1;
            self.frame.indices += run.index_count;
        }

        if self.config.debug_labels {
            backend.pop_debug_label();
        }

        self.frame.models += 1;
        self.state = FrameState::Drawing;
    }

    pub fn end_frame(&mut self) {
        log::trace!(
            "Brush frame: {} models, {} draw calls, {} pipeline binds",
            self.frame.models,
            self.frame.draw_calls,
            self.frame.pipeline_binds
        );
        self.state = FrameState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferHandle, DescriptorSetHandle, RecordedCommand, RecordingBackend};
    use crate::brush::MemoryShaderLoader;
    use crate::buffer::HostBufferArena;
    use crate::host::{
        BrushModel, MaterialTexture, SurfaceFlags, TexInfo, TextureId, UniformBinding,
    };
    use glam::{Vec3, Vec4};

    struct Textures;

    impl TextureRegistry for Textures {
        fn texture_descriptor(&self, texture: TextureId) -> Option<DescriptorSetHandle> {
            (texture >= 0).then(|| DescriptorSetHandle::from_raw(1000 + texture as u64))
        }
    }

    struct Uniforms;

    impl UniformBindings for Uniforms {
        fn uniform_binding(&self, index: u32) -> Option<UniformBinding> {
            Some(UniformBinding {
                set: DescriptorSetHandle::from_raw(500),
                dynamic_offset: index * 256,
            })
        }
    }

    struct Atlas(Option<TextureId>);

    impl LightmapAtlas for Atlas {
        fn ensure_surface_lightmap(&mut self, _model: &dyn SurfaceSource, _surface_index: usize) {}

        fn atlas_texture(&self) -> Option<TextureId> {
            self.0
        }
    }

    fn quad_model(textures: &[TextureId]) -> BrushModel {
        let mut model = BrushModel::new("*1");
        let quad = [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y];
        for &id in textures {
            let texinfo = TexInfo {
                vecs: [Vec4::X, Vec4::Y],
                texture: MaterialTexture {
                    id,
                    width: 16,
                    height: 16,
                },
            };
            model.push_polygon(&quad, SurfaceFlags::empty(), texinfo, Default::default());
        }
        model
    }

    fn setup() -> (RecordingBackend, BrushRenderer, HostBufferArena) {
        let mut backend = RecordingBackend::new();
        let shaders = MemoryShaderLoader::new()
            .with_shader("brush.vert.spv", vec![0x0723_0203])
            .with_shader("brush.frag.spv", vec![0x0723_0203]);
        let renderer =
            BrushRenderer::initialize(&mut backend, &shaders, BrushConfig::default()).unwrap();
        let arena = HostBufferArena::new(BufferHandle::from_raw(77), 1 << 16);
        (backend, renderer, arena)
    }

    #[test]
    fn test_load_is_idempotent() {
        let (_backend, mut renderer, mut arena) = setup();
        let model = quad_model(&[1]);
        let mut atlas = Atlas(Some(0));

        let first = renderer.load_model(ModelId(1), &model, &mut arena, &mut atlas);
        let used = arena.used();
        let second = renderer.load_model(ModelId(1), &model, &mut arena, &mut atlas);

        assert_eq!(first, Ok(LoadOutcome::Loaded));
        assert_eq!(second, Ok(LoadOutcome::AlreadyLoaded));
        assert_eq!(arena.used(), used);
        assert_eq!(renderer.statistics().num_vertices, 4);
    }

    #[test]
    fn test_begin_frame_binds_shared_state() {
        let (mut backend, mut renderer, arena) = setup();
        renderer
            .begin_frame(&mut backend, &arena, &Textures, &Atlas(Some(9)))
            .unwrap();

        let buffer = BufferHandle::from_raw(77);
        let layout = renderer.pipelines().layout();
        assert_eq!(
            backend.commands(),
            &[
                RecordedCommand::BindVertexBuffer { buffer, offset: 0 },
                RecordedCommand::BindIndexBuffer {
                    buffer,
                    offset: 0,
                    format: IndexFormat::Uint16
                },
                RecordedCommand::BindDescriptorSet {
                    layout,
                    index: 2,
                    set: DescriptorSetHandle::from_raw(1009),
                    dynamic_offsets: vec![]
                },
            ]
        );
        assert_eq!(renderer.frame_state(), FrameState::FrameBound);
    }

    #[test]
    fn test_missing_atlas_fails_begin_frame() {
        let (mut backend, mut renderer, arena) = setup();
        let err = renderer
            .begin_frame(&mut backend, &arena, &Textures, &Atlas(None))
            .unwrap_err();

        assert_eq!(err, BrushError::MissingLightmapAtlas);
        assert!(backend.commands().is_empty());
        assert_eq!(renderer.frame_state(), FrameState::Idle);
    }

    #[test]
    fn test_draw_outside_frame_is_skipped() {
        let (mut backend, mut renderer, mut arena) = setup();
        renderer
            .load_model(ModelId(1), &quad_model(&[1]), &mut arena, &mut Atlas(Some(0)))
            .unwrap();

        renderer.draw_model(&mut backend, ModelId(1), 0, 0, &Textures, &Uniforms);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_draw_binds_uniform_with_dynamic_offset() {
        let (mut backend, mut renderer, mut arena) = setup();
        let mut atlas = Atlas(Some(0));
        renderer
            .load_model(ModelId(1), &quad_model(&[1]), &mut arena, &mut atlas)
            .unwrap();

        renderer
            .begin_frame(&mut backend, &arena, &Textures, &atlas)
            .unwrap();
        backend.clear_commands();
        renderer.draw_model(&mut backend, ModelId(1), 0, 3, &Textures, &Uniforms);
        renderer.end_frame();

        assert!(backend.commands().contains(&RecordedCommand::BindDescriptorSet {
            layout: renderer.pipelines().layout(),
            index: 0,
            set: DescriptorSetHandle::from_raw(500),
            dynamic_offsets: vec![768],
        }));
        assert_eq!(backend.draw_calls().len(), 1);
        assert_eq!(renderer.frame_state(), FrameState::Idle);
    }

    #[test]
    fn test_release_and_clear_statistics() {
        let (_backend, mut renderer, mut arena) = setup();
        renderer
            .load_model(ModelId(4), &quad_model(&[1, 2]), &mut arena, &mut Atlas(Some(0)))
            .unwrap();

        renderer.clear_statistics();
        assert_eq!(renderer.statistics(), BrushStatistics::default());
        assert!(renderer.is_loaded(ModelId(4)));

        assert!(renderer.release_model(ModelId(4)));
        assert!(!renderer.release_model(ModelId(4)));
        assert!(renderer.model_cache(ModelId(4)).is_none());
    }

    #[test]
    #[should_panic(expected = "Unexpected render mode")]
    fn test_unknown_render_mode_panics() {
        let (mut backend, mut renderer, _arena) = setup();
        renderer.draw_model(&mut backend, ModelId(1), 42, 0, &Textures, &Uniforms);
    }
}
