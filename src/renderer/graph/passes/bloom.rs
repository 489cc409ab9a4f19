//! Bloom Pass
//!
//! ```text
//! color ─► prefilter (threshold) ─► blur pyramid ─► bloom.result
//!   │                                                    │
//!   └──────────────────► composite ◄─────────────────────┘
//!                            │
//!                            ▼
//!                       color output
//! ```
//!
//! The pyramid depth follows the frame resolution and `blur_radius`, capped
//! by `max_iterations` and the pipeline's blur level cap. `scatter` controls
//! how much each upsample step keeps of the coarser level.

use glam::Vec4;

use super::{expect_settings, resolved};
use crate::errors::Result;
use crate::renderer::binding_table::PropertyId;
use crate::renderer::core::{LoadOp, MaterialHandle};
use crate::renderer::graph::blur::{BlurPyramid, BlurRequest};
use crate::renderer::graph::context::{PassContext, SetupContext};
use crate::renderer::graph::pass::{EffectPass, EffectPassDescriptor};
use crate::renderer::graph::pool::PoolSlot;
use crate::renderer::graph::stage::InjectionPoint;
use crate::volume::{EffectSettings, SettingsKind};

const NAME: &str = "Bloom";

const PREFILTER_SLOT: PoolSlot = PoolSlot::new("bloom.prefilter", 0);
const RESULT_SLOT: PoolSlot = PoolSlot::new("bloom.result", 0);

#[derive(Debug, Clone, Copy)]
struct BloomIds {
    source: PropertyId,
    bloom: PropertyId,
    params: PropertyId,
    tint: PropertyId,
    scatter: PropertyId,
}

pub struct BloomPass {
    prefilter: Option<MaterialHandle>,
    downsample: Option<MaterialHandle>,
    upsample: Option<MaterialHandle>,
    composite: Option<MaterialHandle>,
    pyramid: BlurPyramid,
    ids: Option<BloomIds>,
}

impl BloomPass {
    #[must_use]
    pub fn new(
        prefilter: Option<MaterialHandle>,
        downsample: Option<MaterialHandle>,
        upsample: Option<MaterialHandle>,
        composite: Option<MaterialHandle>,
    ) -> Self {
        Self {
            prefilter,
            downsample,
            upsample,
            composite,
            pyramid: BlurPyramid::new("Bloom Pyramid", "bloom.down", "bloom.up"),
            ids: None,
        }
    }

    #[must_use]
    pub const fn descriptor() -> EffectPassDescriptor {
        EffectPassDescriptor::new(NAME, InjectionPoint::BeforeRenderingPostProcessing)
            .with_settings(SettingsKind::Bloom)
    }
}

impl EffectPass for BloomPass {
    fn bindings(&self) -> &'static [&'static str] {
        &[
            "_SourceTex",
            "_DetailTex",
            "_TexelSize",
            "_PyramidLevel",
            "_BlurRadius",
            "_BloomTex",
            "_BloomParams",
            "_BloomTint",
            "_BloomScatter",
        ]
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        self.pyramid.resolve_bindings(ctx.bindings)?;
        self.pyramid.set_max_levels(ctx.settings.blur_level_cap());
        let [source, bloom, params, tint, scatter] =
            ctx.bindings
                .ids(["_SourceTex", "_BloomTex", "_BloomParams", "_BloomTint", "_BloomScatter"])?;
        self.ids = Some(BloomIds {
            source,
            bloom,
            params,
            tint,
            scatter,
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext, settings: Option<&EffectSettings>) -> Result<()> {
        let settings = expect_settings(settings, NAME, EffectSettings::as_bloom)?;
        let ids = resolved(self.ids, NAME)?;
        let prefilter = ctx.require_material(NAME, self.prefilter)?;
        let downsample = ctx.require_material(NAME, self.downsample)?;
        let upsample = ctx.require_material(NAME, self.upsample)?;
        let composite = ctx.require_material(NAME, self.composite)?;

        let params = Vec4::new(
            settings.intensity.max(0.0),
            settings.threshold.max(0.0),
            settings.scatter.clamp(0.0, 1.0),
            0.0,
        );
        let input = ctx.color_input();

        // ── Prefilter ──────────────────────────────────────────────────────
        let desc = ctx.color_desc(PREFILTER_SLOT.name)?;
        let bright = ctx.pool.acquire(&mut *ctx.backend, PREFILTER_SLOT, &desc)?;
        ctx.backend.set_texture(prefilter, ids.source, input.into());
        ctx.backend.set_vector(prefilter, ids.params, params);
        ctx.backend.record_draw(prefilter, bright.into(), LoadOp::Clear)?;

        // ── Blur ───────────────────────────────────────────────────────────
        let desc = ctx.color_desc(RESULT_SLOT.name)?;
        let result = ctx.pool.acquire(&mut *ctx.backend, RESULT_SLOT, &desc)?;
        ctx.backend.set_float(upsample, ids.scatter, params.z);
        let pyramid = self.pyramid.compute(
            &mut *ctx.backend,
            &mut *ctx.pool,
            &BlurRequest {
                source: bright,
                target: result,
                blur_radius: settings.blur_radius,
                iterations_limit: settings.max_iterations,
                down_material: downsample,
                up_material: upsample,
            },
        )?;
        log::trace!("bloom: {} pyramid levels", pyramid.iterations);
        ctx.blackboard.bloom = Some(result);

        // ── Composite ──────────────────────────────────────────────────────
        let output = ctx.color_output()?;
        ctx.backend.set_texture(composite, ids.source, input.into());
        ctx.backend.set_texture(composite, ids.bloom, result.into());
        ctx.backend.set_vector(composite, ids.params, params);
        ctx.backend.set_vector(composite, ids.tint, settings.tint);
        ctx.backend.record_draw(composite, output.into(), LoadOp::Clear)?;
        ctx.flip_color(output);
        Ok(())
    }
}
