//! Vignette Pass

use glam::Vec4;

use super::{expect_settings, resolved};
use crate::errors::Result;
use crate::renderer::binding_table::PropertyId;
use crate::renderer::core::{LoadOp, MaterialHandle};
use crate::renderer::graph::context::{PassContext, SetupContext};
use crate::renderer::graph::pass::{EffectPass, EffectPassDescriptor};
use crate::renderer::graph::stage::InjectionPoint;
use crate::volume::{EffectSettings, SettingsKind};

const NAME: &str = "Vignette";

pub struct VignettePass {
    material: Option<MaterialHandle>,
    ids: Option<[PropertyId; 3]>,
}

impl VignettePass {
    #[must_use]
    pub fn new(material: Option<MaterialHandle>) -> Self {
        Self { material, ids: None }
    }

    #[must_use]
    pub const fn descriptor() -> EffectPassDescriptor {
        EffectPassDescriptor::new(NAME, InjectionPoint::AfterRenderingPostProcessing)
            .with_settings(SettingsKind::Vignette)
    }
}

impl EffectPass for VignettePass {
    fn bindings(&self) -> &'static [&'static str] {
        &["_SourceTex", "_VignetteParams", "_VignetteColor"]
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        self.ids = Some(ctx.bindings.ids(["_SourceTex", "_VignetteParams", "_VignetteColor"])?);
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext, settings: Option<&EffectSettings>) -> Result<()> {
        let settings = expect_settings(settings, NAME, EffectSettings::as_vignette)?;
        let [source, params, color] = resolved(self.ids, NAME)?;
        let material = ctx.require_material(NAME, self.material)?;

        let input = ctx.color_input();
        let output = ctx.color_output()?;
        ctx.backend.set_texture(material, source, input.into());
        ctx.backend.set_vector(
            material,
            params,
            Vec4::new(
                settings.intensity.clamp(0.0, 1.0),
                settings.smoothness.clamp(0.01, 1.0),
                settings.center.x,
                settings.center.y,
            ),
        );
        ctx.backend.set_vector(material, color, settings.color);
        ctx.backend.record_draw(material, output.into(), LoadOp::Clear)?;
        ctx.flip_color(output);
        Ok(())
    }
}
