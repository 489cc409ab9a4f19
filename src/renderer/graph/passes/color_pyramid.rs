//! Color Pyramid Pass
//!
//! Captures the opaque scene color into a full mip chain that transparent
//! materials sample for rough refraction. Mip 0 is a filtered copy of the
//! current color; every further mip is filtered down from the one above it.
//!
//! The pyramid is a history slot, so the previous frame's pyramid stays
//! readable as `_PrevColorPyramidTexture` (guarded by the
//! `_PREV_COLOR_PYRAMID_VALID` keyword). The pass does not change the
//! post-processing color chain.

use glam::Vec4;

use super::{expect_settings, resolved};
use crate::errors::{PostFxError, Result};
use crate::renderer::binding_table::PropertyId;
use crate::renderer::core::{LoadOp, MaterialHandle, TextureDesc, TextureId, TextureView};
use crate::renderer::graph::context::{PassContext, SetupContext};
use crate::renderer::graph::history::HistorySlotId;
use crate::renderer::graph::pass::{EffectPass, EffectPassDescriptor};
use crate::renderer::graph::pool::PoolSlot;
use crate::renderer::graph::stage::InjectionPoint;
use crate::volume::{EffectSettings, SettingsKind};

const NAME: &str = "Color Pyramid";

const FALLBACK_SLOT: PoolSlot = PoolSlot::new("color_pyramid.fallback", 0);

/// Number of mips in a full chain down to 1×1.
#[inline]
fn full_mip_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

fn pyramid_desc(width: u32, height: u32) -> TextureDesc {
    TextureDesc::new_2d(
        "Color Pyramid",
        width,
        height,
        wgpu::TextureFormat::Rgba16Float,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    )
    .with_mips(full_mip_count(width, height))
}

#[derive(Debug, Clone, Copy)]
struct PyramidIds {
    source: PropertyId,
    texel_size: PropertyId,
    level: PropertyId,
    pyramid: PropertyId,
    prev_pyramid: PropertyId,
    prev_valid: PropertyId,
    params: PropertyId,
}

pub struct ColorPyramidPass {
    material: Option<MaterialHandle>,
    ids: Option<PyramidIds>,
}

impl ColorPyramidPass {
    #[must_use]
    pub fn new(material: Option<MaterialHandle>) -> Self {
        Self { material, ids: None }
    }

    #[must_use]
    pub const fn descriptor() -> EffectPassDescriptor {
        EffectPassDescriptor::new(NAME, InjectionPoint::BeforeRenderingTransparents)
            .with_settings(SettingsKind::ColorPyramid)
    }

    fn pyramid_targets(ctx: &mut PassContext) -> Result<(TextureId, Option<TextureId>)> {
        let camera = ctx.camera.key;
        match ctx.history.current_frame_buffer(camera, HistorySlotId::COLOR_PYRAMID) {
            Ok(Some(current)) => {
                let previous = ctx
                    .history
                    .previous_frame_buffer(camera, HistorySlotId::COLOR_PYRAMID)?;
                Ok((current, previous))
            }
            Ok(None) | Err(PostFxError::StaleHistoryRequest { .. }) => {
                let desc = pyramid_desc(ctx.frame.width, ctx.frame.height);
                let pyramid = ctx.pool.acquire(&mut *ctx.backend, FALLBACK_SLOT, &desc)?;
                Ok((pyramid, None))
            }
            Err(e) => Err(e),
        }
    }
}

impl EffectPass for ColorPyramidPass {
    fn bindings(&self) -> &'static [&'static str] {
        &[
            "_SourceTex",
            "_TexelSize",
            "_PyramidLevel",
            "_ColorPyramidTexture",
            "_PrevColorPyramidTexture",
            "_PREV_COLOR_PYRAMID_VALID",
            "_ColorPyramidParams",
        ]
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        let [source, texel_size, level, pyramid, prev_pyramid, prev_valid, params] = ctx.bindings.ids([
            "_SourceTex",
            "_TexelSize",
            "_PyramidLevel",
            "_ColorPyramidTexture",
            "_PrevColorPyramidTexture",
            "_PREV_COLOR_PYRAMID_VALID",
            "_ColorPyramidParams",
        ])?;
        self.ids = Some(PyramidIds {
            source,
            texel_size,
            level,
            pyramid,
            prev_pyramid,
            prev_valid,
            params,
        });
        Ok(())
    }

    fn on_camera_setup(&mut self, ctx: &mut PassContext, _settings: Option<&EffectSettings>) -> Result<()> {
        let camera = ctx.camera.key;
        if !ctx.history.is_tracked(camera) {
            return Ok(());
        }
        ctx.history.allocate_history_slot(
            &mut *ctx.backend,
            camera,
            HistorySlotId::COLOR_PYRAMID,
            pyramid_desc,
            ctx.settings.history_buffer_count,
            ctx.frame.width,
            ctx.frame.height,
        )?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext, settings: Option<&EffectSettings>) -> Result<()> {
        let settings = expect_settings(settings, NAME, EffectSettings::as_color_pyramid)?;
        let ids = resolved(self.ids, NAME)?;
        let material = ctx.require_material(NAME, self.material)?;

        let (current, previous) = Self::pyramid_targets(ctx)?;
        let desc = ctx
            .backend
            .texture_desc(current)
            .cloned()
            .ok_or(PostFxError::UnknownTexture)?;
        // Mips past the limit keep undefined contents; `_ColorPyramidParams.x`
        // tells shaders how far they may sample.
        let levels = settings.max_mip_levels.clamp(1, desc.mip_level_count);

        let mut source = TextureView::from(ctx.color_input());
        let (mut src_w, mut src_h) = (ctx.frame.width, ctx.frame.height);
        for mip in 0..levels {
            let (w, h) = desc.mip_size(mip);
            ctx.backend.set_texture(material, ids.source, source);
            ctx.backend.set_vector(
                material,
                ids.texel_size,
                Vec4::new(1.0 / src_w as f32, 1.0 / src_h as f32, src_w as f32, src_h as f32),
            );
            ctx.backend.set_float(material, ids.level, mip as f32);
            let target = TextureView::mip(current, mip);
            ctx.backend.record_draw(material, target, LoadOp::Clear)?;
            (source, src_w, src_h) = (target, w, h);
        }

        ctx.backend.set_global_texture(ids.pyramid, Some(current.into()));
        ctx.backend
            .set_global_texture(ids.prev_pyramid, previous.map(TextureView::from));
        ctx.backend.set_global_keyword(ids.prev_valid, previous.is_some());
        ctx.backend.set_global_vector(
            ids.params,
            Vec4::new(levels as f32, desc.width as f32, desc.height as f32, 0.0),
        );
        ctx.blackboard.color_pyramid = Some(current);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_chain_reaches_one_by_one() {
        assert_eq!(full_mip_count(1, 1), 1);
        assert_eq!(full_mip_count(8, 8), 4);
        assert_eq!(full_mip_count(1920, 1080), 11);
        let desc = pyramid_desc(1920, 1080);
        assert_eq!(desc.mip_size(desc.mip_level_count - 1), (1, 1));
    }
}
