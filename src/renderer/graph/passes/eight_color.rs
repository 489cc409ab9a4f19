//! Eight-Color Stylization Pass
//!
//! Quantizes the frame to the closest of eight palette entries. With
//! `downsampling > 1` the shader snaps UVs to a coarser grid, giving a
//! pixelated look without an extra render target.

use glam::Vec4;

use super::{expect_settings, resolved};
use crate::errors::Result;
use crate::renderer::binding_table::PropertyId;
use crate::renderer::core::{LoadOp, MaterialHandle};
use crate::renderer::graph::context::{PassContext, SetupContext};
use crate::renderer::graph::pass::{EffectPass, EffectPassDescriptor};
use crate::renderer::graph::stage::InjectionPoint;
use crate::volume::{EffectSettings, SettingsKind};

const NAME: &str = "Eight Color";

const PALETTE: [&str; 8] = [
    "_Palette0", "_Palette1", "_Palette2", "_Palette3", "_Palette4", "_Palette5", "_Palette6", "_Palette7",
];

#[derive(Debug, Clone, Copy)]
struct EightColorIds {
    source: PropertyId,
    params: PropertyId,
    palette: [PropertyId; 8],
}

pub struct EightColorPass {
    material: Option<MaterialHandle>,
    ids: Option<EightColorIds>,
}

impl EightColorPass {
    #[must_use]
    pub fn new(material: Option<MaterialHandle>) -> Self {
        Self { material, ids: None }
    }

    #[must_use]
    pub const fn descriptor() -> EffectPassDescriptor {
        EffectPassDescriptor::new(NAME, InjectionPoint::AfterRenderingPostProcessing)
            .with_settings(SettingsKind::EightColor)
    }
}

impl EffectPass for EightColorPass {
    fn bindings(&self) -> &'static [&'static str] {
        &[
            "_SourceTex", "_EightColorParams", "_Palette0", "_Palette1", "_Palette2", "_Palette3", "_Palette4",
            "_Palette5", "_Palette6", "_Palette7",
        ]
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        let [source, params] = ctx.bindings.ids(["_SourceTex", "_EightColorParams"])?;
        self.ids = Some(EightColorIds {
            source,
            params,
            palette: ctx.bindings.ids(PALETTE)?,
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext, settings: Option<&EffectSettings>) -> Result<()> {
        let settings = expect_settings(settings, NAME, EffectSettings::as_eight_color)?;
        let ids = resolved(self.ids, NAME)?;
        let material = ctx.require_material(NAME, self.material)?;

        for (id, color) in ids.palette.iter().zip(settings.palette) {
            ctx.backend.set_vector(material, *id, color);
        }
        ctx.backend.set_vector(
            material,
            ids.params,
            Vec4::new(
                settings.opacity.clamp(0.0, 1.0),
                settings.dithering.max(0.0),
                settings.downsampling.max(1) as f32,
                0.0,
            ),
        );

        let input = ctx.color_input();
        let output = ctx.color_output()?;
        ctx.backend.set_texture(material, ids.source, input.into());
        ctx.backend.record_draw(material, output.into(), LoadOp::Clear)?;
        ctx.flip_color(output);
        Ok(())
    }
}
