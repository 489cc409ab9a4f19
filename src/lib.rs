//! Myth PostFX
//!
//! Camera-driven post-processing for the Myth engine. Effects run in a fixed
//! injection-point order against each rendered camera frame, with their
//! parameters resolved per camera from a volume override stack.
//!
//! # Crate Layout
//!
//! - [`renderer`]: the pipeline, its scheduler, resource pool, frame history,
//!   blur pyramid and the graphics backends
//! - [`resources`]: per-effect settings as plain data
//! - [`volume`]: settings resolution (`VolumeResolver`, `VolumeStack`)
//! - [`errors`]: [`PostFxError`] and the crate `Result`
//!
//! # Example
//!
//! ```rust,ignore
//! use myth_postfx::{CameraKey, CameraView, EffectMaterials, FrameContext, HeadlessBackend, PipelineBuilder};
//!
//! let mut backend = HeadlessBackend::new();
//! let materials = EffectMaterials {
//!     tone_mapping: Some(backend.register_material("tone_mapping")),
//!     ..Default::default()
//! };
//! let mut pipeline = PipelineBuilder::new()
//!     .with_standard_effects(&materials)
//!     .build(backend)?;
//!
//! let camera = CameraView::new(CameraKey(1), glam::Vec3::ZERO);
//! pipeline.begin_frame();
//! let stats = pipeline.render_camera(&camera, &FrameContext::new(color, target, 1920, 1080))?;
//! pipeline.end_frame()?;
//! ```

pub mod errors;
pub mod renderer;
pub mod resources;
pub mod volume;

pub use errors::{PostFxError, Result};
pub use renderer::binding_table::{PropertyId, ShaderBindingTable};
pub use renderer::core::{
    FrameGraphBackend, GraphicsBackend, HeadlessBackend, LoadOp, MaterialHandle, TextureDesc, TextureId, TextureView,
    WgpuBackend,
};
pub use renderer::graph::{
    BlurPyramid, CameraView, EffectMaterials, EffectPass, EffectPassDescriptor, FrameContext, FrameHistoryManager,
    FrameStats, HistorySlotId, InjectionPoint, PassFlags, ResourcePool, Scheduler,
};
pub use renderer::registry::{AdditionalLightData, CameraKey, KeyedRegistry, LightKey};
pub use renderer::settings::PipelineSettings;
pub use renderer::{PipelineBuilder, PostFxPipeline};
pub use resources::{
    BloomSettings, ColorPyramidSettings, ContactShadowSettings, EightColorSettings, ToneMappingMode,
    ToneMappingSettings, VignetteSettings,
};
pub use volume::{DefaultResolver, EffectSettings, ResolvedSettings, SettingsKind, VolumeResolver, stack::VolumeStack};
