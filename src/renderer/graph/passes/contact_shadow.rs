//! Contact Shadow Pass
//!
//! Screen-space ray marching from each depth sample towards every light that
//! has contact shadows enabled, producing a single-channel occlusion mask.
//!
//! # Pipeline
//!
//! ```text
//! depth + normal ─► trace (per light, 8×8 tiles) ─► contact_shadow.raw
//!                                                        │
//!                           ┌── denoise (H → V) ─────────┤
//!                           │                            │ (or copy)
//!                           ▼                            ▼
//!              previous mask valid?  ── yes ─► temporal blend ─► history[current]
//!                           └────────── no ──────────────────────► history[current]
//! ```
//!
//! The mask lives in the camera's `contact_shadow` history slot so the next
//! frame can blend against it. When the camera has no history (untracked or
//! single-buffered) the pass falls back to a pooled mask and skips the
//! temporal blend.

use glam::Vec4;

use super::{expect_settings, resolved};
use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::PropertyId;
use crate::renderer::core::{LoadOp, MaterialHandle, TextureDesc, TextureId};
use crate::renderer::graph::context::{PassContext, SetupContext};
use crate::renderer::graph::dispatch::{SeparableFilter, TileDispatch};
use crate::renderer::graph::history::HistorySlotId;
use crate::renderer::graph::pass::{EffectPass, EffectPassDescriptor, PassFlags};
use crate::renderer::graph::pool::PoolSlot;
use crate::renderer::graph::stage::InjectionPoint;
use crate::resources::ContactShadowSettings;
use crate::volume::{EffectSettings, SettingsKind};

const NAME: &str = "Contact Shadows";

const RAW_SLOT: PoolSlot = PoolSlot::new("contact_shadow.raw", 0);
const FILTERED_SLOT: PoolSlot = PoolSlot::new("contact_shadow.filtered", 0);
const SCRATCH_SLOT: PoolSlot = PoolSlot::new("contact_shadow.scratch", 0);
const FALLBACK_SLOT: PoolSlot = PoolSlot::new("contact_shadow.mask", 0);

const TRACE: TileDispatch = TileDispatch::new(0);

/// Occlusion mask descriptor.
fn mask_desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc::new_2d(
        "Contact Shadow Mask",
        width,
        height,
        wgpu::TextureFormat::R8Unorm,
        wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
    )
}

#[derive(Debug, Clone, Copy)]
struct ContactShadowIds {
    depth: PropertyId,
    normal: PropertyId,
    output: PropertyId,
    params: PropertyId,
    light: PropertyId,
    light_index: PropertyId,
    source: PropertyId,
    history: PropertyId,
    global_mask: PropertyId,
    global_opacity: PropertyId,
}

pub struct ContactShadowPass {
    trace: Option<MaterialHandle>,
    denoise: Option<MaterialHandle>,
    temporal: Option<MaterialHandle>,
    filter: SeparableFilter,
    ids: Option<ContactShadowIds>,
}

impl ContactShadowPass {
    #[must_use]
    pub fn new(
        trace: Option<MaterialHandle>,
        denoise: Option<MaterialHandle>,
        temporal: Option<MaterialHandle>,
    ) -> Self {
        Self {
            trace,
            denoise,
            temporal,
            filter: SeparableFilter::new(0, 1),
            ids: None,
        }
    }

    #[must_use]
    pub const fn descriptor() -> EffectPassDescriptor {
        EffectPassDescriptor::new(NAME, InjectionPoint::AfterRenderingOpaques)
            .with_flags(PassFlags::NEEDS_DEPTH.union(PassFlags::NEEDS_NORMAL))
            .with_settings(SettingsKind::ContactShadow)
    }

    fn buffer_count(settings: &ContactShadowSettings, history_buffer_count: u32) -> u32 {
        if settings.temporal { history_buffer_count } else { 1 }
    }

    /// The mask to write this frame and, when blending is possible, the
    /// previous frame's mask.
    fn mask_targets(ctx: &mut PassContext) -> Result<(TextureId, Option<TextureId>)> {
        let camera = ctx.camera.key;
        match ctx.history.current_frame_buffer(camera, HistorySlotId::CONTACT_SHADOW) {
            Ok(Some(current)) => {
                let previous = ctx
                    .history
                    .previous_frame_buffer(camera, HistorySlotId::CONTACT_SHADOW)?;
                Ok((current, previous))
            }
            Ok(None) | Err(PostFxError::StaleHistoryRequest { .. }) => {
                let desc = mask_desc(ctx.frame.width, ctx.frame.height);
                let mask = ctx.pool.acquire(&mut *ctx.backend, FALLBACK_SLOT, &desc)?;
                Ok((mask, None))
            }
            Err(e) => Err(e),
        }
    }
}

impl EffectPass for ContactShadowPass {
    fn bindings(&self) -> &'static [&'static str] {
        &[
            "_DepthTex",
            "_NormalTex",
            "_InputTex",
            "_OutputTex",
            "_ContactShadowParams",
            "_ContactShadowLight",
            "_LightIndex",
            "_SourceTex",
            "_HistoryTex",
            "_ContactShadowTexture",
            "_ContactShadowOpacity",
        ]
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        self.filter.resolve_bindings(ctx.bindings)?;
        let [depth, normal, output, params, light, light_index] = ctx.bindings.ids([
            "_DepthTex",
            "_NormalTex",
            "_OutputTex",
            "_ContactShadowParams",
            "_ContactShadowLight",
            "_LightIndex",
        ])?;
        let [source, history, global_mask, global_opacity] = ctx.bindings.ids([
            "_SourceTex",
            "_HistoryTex",
            "_ContactShadowTexture",
            "_ContactShadowOpacity",
        ])?;
        self.ids = Some(ContactShadowIds {
            depth,
            normal,
            output,
            params,
            light,
            light_index,
            source,
            history,
            global_mask,
            global_opacity,
        });
        Ok(())
    }

    fn on_camera_setup(&mut self, ctx: &mut PassContext, settings: Option<&EffectSettings>) -> Result<()> {
        let settings = expect_settings(settings, NAME, EffectSettings::as_contact_shadow)?;
        let camera = ctx.camera.key;
        if !ctx.history.is_tracked(camera) {
            log::trace!("contact shadows: camera {camera:?} has no history, temporal path disabled");
            return Ok(());
        }
        ctx.history.allocate_history_slot(
            &mut *ctx.backend,
            camera,
            HistorySlotId::CONTACT_SHADOW,
            mask_desc,
            Self::buffer_count(settings, ctx.settings.history_buffer_count),
            ctx.frame.width,
            ctx.frame.height,
        )?;
        // The temporal path needs this target from the second frame on;
        // taking it now keeps later frames allocation-free.
        if settings.temporal {
            let desc = mask_desc(ctx.frame.width, ctx.frame.height);
            ctx.pool.acquire(&mut *ctx.backend, FILTERED_SLOT, &desc)?;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext, settings: Option<&EffectSettings>) -> Result<()> {
        let settings = expect_settings(settings, NAME, EffectSettings::as_contact_shadow)?;
        let ids = resolved(self.ids, NAME)?;
        let trace = ctx.require_material(NAME, self.trace)?;
        let (Some(depth), Some(normal)) = (ctx.frame.depth, ctx.frame.normal) else {
            return Err(PostFxError::configuration(NAME, "frame has no depth or normal texture"));
        };
        let (w, h) = (ctx.frame.width, ctx.frame.height);

        // ── Trace ──────────────────────────────────────────────────────────
        let raw = ctx.pool.acquire(&mut *ctx.backend, RAW_SLOT, &mask_desc(w, h))?;
        ctx.backend.set_texture(trace, ids.depth, depth.into());
        ctx.backend.set_texture(trace, ids.normal, normal.into());
        ctx.backend.set_storage_texture(trace, ids.output, raw.into());
        ctx.backend.set_vector(
            trace,
            ids.params,
            Vec4::new(
                settings.length.max(0.0),
                settings.max_distance.max(0.0),
                settings.thickness.max(0.0),
                settings.sample_count.max(1) as f32,
            ),
        );

        let mut traced = 0u32;
        for (_, light) in ctx.lights.iter_sorted().filter(|(_, l)| l.contact_shadows) {
            ctx.backend.set_vector(trace, ids.light, light.direction.extend(light.shadow_strength));
            ctx.backend.set_float(trace, ids.light_index, traced as f32);
            TRACE.record(&mut *ctx.backend, trace, w, h)?;
            traced += 1;
        }
        if traced == 0 {
            log::trace!("contact shadows: no light casts contact shadows");
            return Ok(());
        }

        // ── Denoise ────────────────────────────────────────────────────────
        let (current, previous) = Self::mask_targets(ctx)?;
        let previous = if settings.temporal { previous } else { None };
        let filtered = if previous.is_some() {
            ctx.pool.acquire(&mut *ctx.backend, FILTERED_SLOT, &mask_desc(w, h))?
        } else {
            current
        };
        if settings.denoise {
            let denoise = ctx.require_material(NAME, self.denoise)?;
            self.filter
                .run(&mut *ctx.backend, &mut *ctx.pool, denoise, raw, filtered, SCRATCH_SLOT)?;
        } else {
            ctx.backend.record_copy(raw, filtered)?;
        }

        // ── Temporal ───────────────────────────────────────────────────────
        if let Some(previous) = previous {
            let temporal = ctx.require_material(NAME, self.temporal)?;
            ctx.backend.set_texture(temporal, ids.source, filtered.into());
            ctx.backend.set_texture(temporal, ids.history, previous.into());
            ctx.backend.record_draw(temporal, current.into(), LoadOp::Clear)?;
        }

        ctx.backend.set_global_texture(ids.global_mask, Some(current.into()));
        ctx.backend
            .set_global_float(ids.global_opacity, settings.opacity.clamp(0.0, 1.0));
        ctx.blackboard.contact_shadow_mask = Some(current);
        Ok(())
    }
}
