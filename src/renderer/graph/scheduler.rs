//! Injection-Point Scheduler
//!
//! Owns the registered effect passes and runs them once per camera frame.
//!
//! # Ordering
//!
//! Passes are kept sorted by
//!
//! ```text
//! (injection_point, global modifiers first, registration order)
//! ```
//!
//! Registration inserts at the partition point, so the order is stable and
//! never re-sorted at run time.
//!
//! # Per-Frame Flow
//!
//! ```text
//! run_frame(camera, frame)
//!   ├─ validate frame                          (only error that escapes)
//!   ├─ pool scope = camera
//!   ├─ for pass in order:
//!   │    ├─ resolve(kind, camera)             inactive → skip (no GPU work)
//!   │    │                                    (no kind or global → always runs)
//!   │    ├─ depth/normal required but absent  → skip
//!   │    └─ push_debug_group(name)
//!   │         on_camera_setup → execute      error → log, continue
//!   │       pop_debug_group
//!   ├─ copy final color → camera target
//!   └─ pool scope back to shared
//! ```
//!
//! Pass errors never leave the scheduler. Configuration errors are logged at
//! `warn` the first time a pass hits one and at `debug` afterwards.

use rustc_hash::FxHashSet;

use super::context::{CameraView, FrameContext, PassContext, PipelineResources, SetupContext};
use super::pass::{EffectPass, EffectPassDescriptor, PassFlags};
use crate::errors::{PostFxError, Result};
use crate::renderer::registry::CameraKey;
use crate::volume::SettingsKind;

struct RegisteredPass {
    descriptor: EffectPassDescriptor,
    pass: Box<dyn EffectPass>,
    config_error_logged: bool,
}

/// Outcome of one camera frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Names of the passes that executed successfully, in order.
    pub executed: Vec<&'static str>,
    pub skipped_inactive: u32,
    pub skipped_missing_input: u32,
    pub failed: u32,
    /// Whether any pass wrote post-processing color.
    pub wrote_color: bool,
}

/// Ordered pass registry and executor.
#[derive(Default)]
pub struct Scheduler {
    passes: Vec<RegisteredPass>,
    kinds: FxHashSet<SettingsKind>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pass. At most one pass per settings kind.
    pub fn register_pass(&mut self, descriptor: EffectPassDescriptor, pass: Box<dyn EffectPass>) -> Result<()> {
        if let Some(kind) = descriptor.settings_kind {
            if !self.kinds.insert(kind) {
                return Err(PostFxError::DuplicatePass(kind.to_string()));
            }
        }

        let key = sort_key(&descriptor);
        let at = self.passes.partition_point(|p| sort_key(&p.descriptor) <= key);
        log::debug!(
            "scheduler: registered '{}' at {} (slot {at})",
            descriptor.name,
            descriptor.injection_point.name()
        );
        self.passes.insert(
            at,
            RegisteredPass {
                descriptor,
                pass,
                config_error_logged: false,
            },
        );
        Ok(())
    }

    /// Runs every pass's one-time setup. Stops at the first failure.
    pub fn setup_all(&mut self, ctx: &mut SetupContext) -> Result<()> {
        for entry in &mut self.passes {
            entry.pass.setup(ctx).map_err(|e| {
                log::error!("setup of '{}' failed: {e}", entry.descriptor.name);
                e
            })?;
        }
        Ok(())
    }

    /// Binding names declared by every registered pass.
    pub fn declared_bindings(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().flat_map(|p| p.pass.bindings().iter().copied())
    }

    /// Pass names in execution order.
    #[must_use]
    pub fn execution_order(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.descriptor.name).collect()
    }

    /// The pass registered for `kind`.
    #[must_use]
    pub fn pass_for_kind(&self, kind: SettingsKind) -> Option<&EffectPassDescriptor> {
        self.passes
            .iter()
            .map(|p| &p.descriptor)
            .find(|d| d.settings_kind == Some(kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Forwards camera removal to every pass.
    pub fn camera_removed(&mut self, camera: CameraKey) {
        for entry in &mut self.passes {
            entry.pass.on_camera_removed(camera);
        }
    }

    /// Runs one camera frame.
    ///
    /// Only frame-level validation errors are returned; pass failures are
    /// contained and counted in [`FrameStats::failed`].
    pub fn run_frame<'a>(
        &mut self,
        res: PipelineResources<'a>,
        camera: &'a CameraView,
        frame: &'a FrameContext,
    ) -> Result<FrameStats> {
        frame.validate(&*res.backend)?;

        let mut stats = FrameStats::default();
        let mut ctx = PassContext::new(res, camera, frame);
        ctx.pool.set_scope(Some(camera.key));

        for entry in &mut self.passes {
            let desc = entry.descriptor;

            // ── Resolve ────────────────────────────────────────────────────
            let resolved = desc
                .settings_kind
                .and_then(|kind| ctx.resolver.resolve(kind, camera));
            let active = match desc.settings_kind {
                None => true,
                Some(_) => desc.is_global_modifier() || resolved.is_some_and(|r| r.is_active),
            };
            if !active {
                log::trace!("'{}' inactive for camera {:?}", desc.name, camera.key);
                stats.skipped_inactive += 1;
                continue;
            }

            // ── Inputs ─────────────────────────────────────────────────────
            let missing_depth = desc.flags.contains(PassFlags::NEEDS_DEPTH) && frame.depth.is_none();
            let missing_normal = desc.flags.contains(PassFlags::NEEDS_NORMAL) && frame.normal.is_none();
            if missing_depth || missing_normal {
                log::trace!("'{}' skipped: required depth/normal input missing", desc.name);
                stats.skipped_missing_input += 1;
                continue;
            }

            // ── Execute ────────────────────────────────────────────────────
            let settings = resolved.as_ref().map(|r| &r.settings);
            ctx.to_camera_target = desc.flags.contains(PassFlags::RENDERS_TO_CAMERA_TARGET);
            ctx.backend.push_debug_group(desc.name);
            let result = entry
                .pass
                .on_camera_setup(&mut ctx, settings)
                .and_then(|()| entry.pass.execute(&mut ctx, settings));
            ctx.backend.pop_debug_group();
            ctx.to_camera_target = false;

            match result {
                Ok(()) => stats.executed.push(desc.name),
                Err(e) => {
                    stats.failed += 1;
                    if e.is_configuration() {
                        if entry.config_error_logged {
                            log::debug!("'{}' skipped: {e}", desc.name);
                        } else {
                            log::warn!("'{}' skipped: {e}", desc.name);
                            entry.config_error_logged = true;
                        }
                    } else {
                        log::error!("'{}' failed: {e}", desc.name);
                    }
                }
            }
        }

        // ── Final color ────────────────────────────────────────────────────
        stats.wrote_color = ctx.color.written();
        let final_color = ctx.color.current();
        if final_color != frame.target {
            if let Err(e) = ctx.backend.record_copy(final_color, frame.target) {
                log::error!("copy of final color to camera target failed: {e}");
            }
        }
        ctx.pool.set_scope(None);

        Ok(stats)
    }
}

fn sort_key(desc: &EffectPassDescriptor) -> (u8, u8) {
    (
        desc.injection_point.order(),
        u8::from(!desc.is_global_modifier()),
    )
}
