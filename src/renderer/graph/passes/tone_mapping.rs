//! Tone Mapping Pass
//!
//! Maps HDR color into display range with the curve selected by
//! [`ToneMappingMode`](crate::resources::ToneMappingMode). Exactly one mode keyword is enabled per draw; the
//! linear mode enables none.

use super::{expect_settings, resolved};
use crate::errors::Result;
use crate::renderer::binding_table::PropertyId;
use crate::renderer::core::{LoadOp, MaterialHandle};
use crate::renderer::graph::context::{PassContext, SetupContext};
use crate::renderer::graph::pass::{EffectPass, EffectPassDescriptor};
use crate::renderer::graph::stage::InjectionPoint;
use crate::volume::{EffectSettings, SettingsKind};

const NAME: &str = "Tone Mapping";

/// Keywords of the non-linear curves, as returned by `ToneMappingMode::keyword`.
const MODE_KEYWORDS: [&str; 4] = ["_TONEMAP_NEUTRAL", "_TONEMAP_REINHARD", "_TONEMAP_ACES", "_TONEMAP_AGX"];

#[derive(Debug, Clone, Copy)]
struct ToneMappingIds {
    source: PropertyId,
    exposure: PropertyId,
    modes: [PropertyId; 4],
}

pub struct ToneMappingPass {
    material: Option<MaterialHandle>,
    ids: Option<ToneMappingIds>,
}

impl ToneMappingPass {
    #[must_use]
    pub fn new(material: Option<MaterialHandle>) -> Self {
        Self { material, ids: None }
    }

    #[must_use]
    pub const fn descriptor() -> EffectPassDescriptor {
        EffectPassDescriptor::new(NAME, InjectionPoint::BeforeRenderingPostProcessing)
            .with_settings(SettingsKind::ToneMapping)
    }
}

impl EffectPass for ToneMappingPass {
    fn bindings(&self) -> &'static [&'static str] {
        &[
            "_SourceTex",
            "_Exposure",
            "_TONEMAP_NEUTRAL",
            "_TONEMAP_REINHARD",
            "_TONEMAP_ACES",
            "_TONEMAP_AGX",
        ]
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        let [source, exposure] = ctx.bindings.ids(["_SourceTex", "_Exposure"])?;
        self.ids = Some(ToneMappingIds {
            source,
            exposure,
            modes: ctx.bindings.ids(MODE_KEYWORDS)?,
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext, settings: Option<&EffectSettings>) -> Result<()> {
        let settings = expect_settings(settings, NAME, EffectSettings::as_tone_mapping)?;
        let ids = resolved(self.ids, NAME)?;
        let material = ctx.require_material(NAME, self.material)?;

        let selected = settings.mode.keyword();
        for (keyword, id) in MODE_KEYWORDS.into_iter().zip(ids.modes) {
            ctx.backend.set_keyword(material, id, selected == Some(keyword));
        }

        let input = ctx.color_input();
        let output = ctx.color_output()?;
        ctx.backend.set_texture(material, ids.source, input.into());
        ctx.backend.set_float(material, ids.exposure, settings.exposure);
        ctx.backend.record_draw(material, output.into(), LoadOp::Clear)?;
        ctx.flip_color(output);
        log::trace!("tone mapping: {} curve, exposure {}", settings.mode, settings.exposure);
        Ok(())
    }
}
