//! Post-Processing Pipeline
//!
//! [`PostFxPipeline`] is the single owner of every piece of mutable state the
//! effect passes share: the graphics backend, the resource pool, the frame
//! history, the shader binding table and the camera/light registries. Nothing
//! lives in globals, so two pipelines never observe each other.
//!
//! # Lifecycle
//!
//! ```text
//! PipelineBuilder::new()
//!     .with_settings(..)          optional
//!     .with_resolver(..)          optional (DefaultResolver otherwise)
//!     .with_standard_effects(..)  and/or .with_pass(..)
//!     .build(backend)?            declare bindings → seal → setup passes
//!
//! loop {
//!     pipeline.begin_frame();
//!     pipeline.render_camera(&camera, &frame)?;   once per camera
//!     pipeline.end_frame()?;                      submit, age pool, trim
//! }
//!
//! pipeline.shutdown()                             release everything, return backend
//! ```

pub mod binding_table;
pub mod core;
pub mod graph;
pub mod registry;
pub mod settings;

use self::binding_table::ShaderBindingTable;
use self::core::GraphicsBackend;
use self::graph::context::{CameraView, FrameContext, PipelineResources, SetupContext};
use self::graph::history::FrameHistoryManager;
use self::graph::pass::{EffectPass, EffectPassDescriptor};
use self::graph::passes::{EffectMaterials, standard_passes};
use self::graph::pool::ResourcePool;
use self::graph::scheduler::{FrameStats, Scheduler};
use self::registry::{AdditionalLightData, CameraKey, KeyedRegistry, LightKey};
use self::settings::PipelineSettings;
use crate::errors::Result;
use crate::volume::{DefaultResolver, VolumeResolver};

/// Bookkeeping for a registered camera.
#[derive(Debug, Clone, Copy, Default)]
struct CameraRecord {
    frames_rendered: u64,
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────

/// Camera-driven post-processing pipeline over a graphics backend `B`.
pub struct PostFxPipeline<B: GraphicsBackend> {
    backend: B,
    pool: ResourcePool,
    history: FrameHistoryManager,
    bindings: ShaderBindingTable,
    scheduler: Scheduler,
    resolver: Box<dyn VolumeResolver>,
    cameras: KeyedRegistry<CameraKey, CameraRecord>,
    lights: KeyedRegistry<LightKey, AdditionalLightData>,
    settings: PipelineSettings,
    frame_count: u64,
}

impl<B: GraphicsBackend> PostFxPipeline<B> {
    // ── Cameras ────────────────────────────────────────────────────────────

    /// Registers a camera so its history buffers persist across frames.
    ///
    /// Registering twice is a no-op.
    pub fn register_camera(&mut self, camera: CameraKey) {
        self.cameras.get_or_register_with(camera, CameraRecord::default);
        self.history.track_camera(camera);
    }

    /// Unregisters a camera and releases every history buffer and pooled
    /// target it owns.
    ///
    /// Returns `false` if the camera was not registered.
    pub fn unregister_camera(&mut self, camera: CameraKey) -> bool {
        if self.cameras.unregister(camera).is_none() {
            return false;
        }
        let released = self.history.release_camera(&mut self.backend, camera);
        let pooled = self.pool.release_scope(&mut self.backend, camera);
        self.scheduler.camera_removed(camera);
        log::debug!(
            "pipeline: unregistered camera {camera:?} ({released} history buffers, {pooled} pooled targets released)"
        );
        true
    }

    #[must_use]
    pub fn is_camera_registered(&self, camera: CameraKey) -> bool {
        self.cameras.contains(camera)
    }

    /// Frames rendered for a registered camera.
    #[must_use]
    pub fn camera_frames(&self, camera: CameraKey) -> Option<u64> {
        self.cameras.get(camera).map(|c| c.frames_rendered)
    }

    // ── Lights ─────────────────────────────────────────────────────────────

    /// Registers or replaces a light's auxiliary data.
    pub fn register_light(&mut self, light: LightKey, data: AdditionalLightData) -> Option<AdditionalLightData> {
        self.lights.register(light, data)
    }

    pub fn unregister_light(&mut self, light: LightKey) -> Option<AdditionalLightData> {
        self.lights.unregister(light)
    }

    #[must_use]
    pub fn lights(&self) -> &KeyedRegistry<LightKey, AdditionalLightData> {
        &self.lights
    }

    // ── Frame ──────────────────────────────────────────────────────────────

    pub fn begin_frame(&mut self) {
        self.backend.begin_frame();
    }

    /// Runs every active pass for one camera and writes the result into
    /// `frame.target`.
    ///
    /// Only frame-level validation (zero size, dead source or target) is
    /// reported as an error; a failing pass is logged and skipped.
    pub fn render_camera(&mut self, camera: &CameraView, frame: &FrameContext) -> Result<FrameStats> {
        if !self.cameras.contains(camera.key) {
            if self.settings.auto_register_cameras {
                self.register_camera(camera.key);
            } else {
                log::trace!("camera {:?} is not registered, history disabled", camera.key);
            }
        }

        let resources = PipelineResources {
            backend: &mut self.backend,
            pool: &mut self.pool,
            history: &mut self.history,
            bindings: &self.bindings,
            lights: &self.lights,
            resolver: &*self.resolver,
            settings: &self.settings,
        };
        let stats = self.scheduler.run_frame(resources, camera, frame)?;

        self.history.end_camera_frame(camera.key);
        if let Some(record) = self.cameras.get_mut(camera.key) {
            record.frames_rendered += 1;
        }
        Ok(stats)
    }

    /// Submits the frame's work and ages the resource pool. Idle pool slots
    /// are trimmed every `pool_trim_interval` frames.
    pub fn end_frame(&mut self) -> Result<()> {
        self.backend.end_frame()?;
        self.pool.end_frame();
        self.frame_count += 1;

        let interval = self.settings.pool_trim_interval;
        if interval > 0 && self.frame_count.is_multiple_of(interval) {
            let released = self
                .pool
                .trim(&mut self.backend, self.settings.pool_max_idle_frames);
            if released > 0 {
                log::debug!("pipeline: trimmed {released} idle pool targets");
            }
        }
        Ok(())
    }

    /// Releases every pooled and history texture and hands the backend back.
    pub fn shutdown(mut self) -> B {
        self.history.release_all(&mut self.backend);
        self.pool.release_all(&mut self.backend);
        // Flushes releases a deferring backend is still holding.
        if let Err(e) = self.backend.end_frame() {
            log::warn!("pipeline: final flush on shutdown failed: {e}");
        }
        log::debug!("pipeline: shut down after {} frames", self.frame_count);
        self.backend
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn set_resolver(&mut self, resolver: Box<dyn VolumeResolver>) {
        self.resolver = resolver;
    }

    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    #[inline]
    #[must_use]
    pub fn history(&self) -> &FrameHistoryManager {
        &self.history
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &ShaderBindingTable {
        &self.bindings
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

// ─── Builder ──────────────────────────────────────────────────────────────────

/// Assembles a [`PostFxPipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    settings: PipelineSettings,
    resolver: Option<Box<dyn VolumeResolver>>,
    passes: Vec<(EffectPassDescriptor, Box<dyn EffectPass>)>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Box<dyn VolumeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Adds a pass. Passes are ordered by injection point at build time;
    /// the order of `with_pass` calls breaks ties.
    #[must_use]
    pub fn with_pass(mut self, descriptor: EffectPassDescriptor, pass: Box<dyn EffectPass>) -> Self {
        self.passes.push((descriptor, pass));
        self
    }

    /// Adds the standard effect set (see [`graph::passes`]).
    #[must_use]
    pub fn with_standard_effects(mut self, materials: &EffectMaterials) -> Self {
        self.passes.extend(standard_passes(materials));
        self
    }

    /// Registers the passes, builds and seals the binding table and runs
    /// every pass's setup.
    ///
    /// Fails on a duplicate settings kind or when a pass resolves a binding
    /// it did not declare.
    pub fn build<B: GraphicsBackend>(self, backend: B) -> Result<PostFxPipeline<B>> {
        let mut scheduler = Scheduler::new();
        for (descriptor, pass) in self.passes {
            scheduler.register_pass(descriptor, pass)?;
        }

        let mut bindings = ShaderBindingTable::new();
        for name in scheduler.declared_bindings() {
            bindings.declare(name);
        }
        bindings.seal();

        scheduler.setup_all(&mut SetupContext {
            bindings: &bindings,
            settings: &self.settings,
        })?;

        log::info!(
            "post-processing pipeline built on '{}': {} passes, {} bindings",
            backend.name(),
            scheduler.len(),
            bindings.len()
        );
        Ok(PostFxPipeline {
            backend,
            pool: ResourcePool::new(),
            history: FrameHistoryManager::new(),
            bindings,
            scheduler,
            resolver: self.resolver.unwrap_or_else(|| Box::new(DefaultResolver)),
            cameras: KeyedRegistry::new(),
            lights: KeyedRegistry::new(),
            settings: self.settings,
            frame_count: 0,
        })
    }
}
