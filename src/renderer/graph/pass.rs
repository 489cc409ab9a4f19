//! Effect Pass Interface
//!
//! An effect pass is one unit of post-processing work. The scheduler owns
//! every registered pass together with its immutable
//! [`EffectPassDescriptor`] and drives it through three phases:
//!
//! | Phase | When | Typical work |
//! |-------|------|--------------|
//! | [`setup`](EffectPass::setup) | Once, at pipeline build | Resolve shader binding ids |
//! | [`on_camera_setup`](EffectPass::on_camera_setup) | Per camera frame, when active | Allocate history, size buffers |
//! | [`execute`](EffectPass::execute) | Right after `on_camera_setup` | Bind parameters, record draws/dispatches |
//!
//! Both per-frame phases receive the resolved settings for the camera. A
//! pass must not keep them beyond the call.

use bitflags::bitflags;

use super::context::{PassContext, SetupContext};
use super::stage::InjectionPoint;
use crate::errors::Result;
use crate::renderer::registry::CameraKey;
use crate::volume::{EffectSettings, SettingsKind};

bitflags! {
    /// Requirements and behavior of a pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PassFlags: u32 {
        /// Skipped when the frame carries no depth texture.
        const NEEDS_DEPTH = 1 << 0;
        /// Skipped when the frame carries no normal texture.
        const NEEDS_NORMAL = 1 << 1;
        /// Color output goes straight to the camera target.
        const RENDERS_TO_CAMERA_TARGET = 1 << 2;
        /// Runs every frame regardless of settings, ahead of effect passes
        /// at the same injection point.
        const GLOBAL_MODIFIER = 1 << 3;
    }
}

/// Immutable registration data of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectPassDescriptor {
    pub name: &'static str,
    pub injection_point: InjectionPoint,
    pub flags: PassFlags,
    /// Settings looked up through the resolver. A pass without a settings
    /// kind runs every frame.
    pub settings_kind: Option<SettingsKind>,
}

impl EffectPassDescriptor {
    #[must_use]
    pub const fn new(name: &'static str, injection_point: InjectionPoint) -> Self {
        Self {
            name,
            injection_point,
            flags: PassFlags::empty(),
            settings_kind: None,
        }
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: PassFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub const fn with_settings(mut self, kind: SettingsKind) -> Self {
        self.settings_kind = Some(kind);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_global_modifier(&self) -> bool {
        self.flags.contains(PassFlags::GLOBAL_MODIFIER)
    }
}

/// A schedulable post-processing pass.
pub trait EffectPass {
    /// Shader property names this pass resolves in [`setup`](Self::setup).
    ///
    /// Every name is declared in the pipeline's binding table before it is
    /// sealed.
    fn bindings(&self) -> &'static [&'static str] {
        &[]
    }

    /// One-time initialization at pipeline build.
    fn setup(&mut self, _ctx: &mut SetupContext) -> Result<()> {
        Ok(())
    }

    /// Per-camera preparation, called only when the pass will execute.
    fn on_camera_setup(&mut self, _ctx: &mut PassContext, _settings: Option<&EffectSettings>) -> Result<()> {
        Ok(())
    }

    /// Records the pass's GPU work.
    fn execute(&mut self, ctx: &mut PassContext, settings: Option<&EffectSettings>) -> Result<()>;

    /// The camera was unregistered; drop any per-camera state.
    fn on_camera_removed(&mut self, _camera: CameraKey) {}
}
