//! Global Keywords Pass
//!
//! Publishes per-camera shader globals before any other pass runs:
//!
//! - `_ScreenParams` = `(width, height, 1/width, 1/height)`
//! - `_FrameIndex`, `_HistoryParity` from the camera's history clock
//! - one `_*_ON` keyword per effect kind, from the resolver's activity flag
//!
//! Every global an effect pass publishes is reset here (textures unbound,
//! `_PREV_COLOR_PYRAMID_VALID` off, params zeroed) so a camera never sees
//! another camera's mask or pyramid. The producing passes set them again.
//!
//! Runs as a global modifier: every frame, regardless of settings, and
//! records no GPU work.

use glam::Vec4;

use super::resolved;
use crate::errors::Result;
use crate::renderer::binding_table::PropertyId;
use crate::renderer::graph::context::{PassContext, SetupContext};
use crate::renderer::graph::pass::{EffectPass, EffectPassDescriptor, PassFlags};
use crate::renderer::graph::stage::InjectionPoint;
use crate::volume::{EffectSettings, SettingsKind};

const NAME: &str = "Global Keywords";

/// Keyword per settings kind, in [`SettingsKind::ALL`] order.
const KIND_KEYWORDS: [&str; 6] = [
    "_TONE_MAPPING_ON",
    "_VIGNETTE_ON",
    "_BLOOM_ON",
    "_CONTACT_SHADOWS_ON",
    "_COLOR_PYRAMID_ON",
    "_EIGHT_COLOR_ON",
];

/// Global textures owned by effect passes.
const EFFECT_TEXTURES: [&str; 3] = ["_ContactShadowTexture", "_ColorPyramidTexture", "_PrevColorPyramidTexture"];

/// Non-texture globals owned by effect passes.
const EFFECT_STATE: [&str; 3] = ["_PREV_COLOR_PYRAMID_VALID", "_ColorPyramidParams", "_ContactShadowOpacity"];

#[derive(Debug, Clone, Copy)]
struct GlobalIds {
    screen_params: PropertyId,
    frame_index: PropertyId,
    history_parity: PropertyId,
    kinds: [PropertyId; 6],
    textures: [PropertyId; 3],
    prev_pyramid_valid: PropertyId,
    pyramid_params: PropertyId,
    contact_shadow_opacity: PropertyId,
}

#[derive(Default)]
pub struct GlobalKeywordsPass {
    ids: Option<GlobalIds>,
}

impl GlobalKeywordsPass {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn descriptor() -> EffectPassDescriptor {
        EffectPassDescriptor::new(NAME, InjectionPoint::BeforeRendering).with_flags(PassFlags::GLOBAL_MODIFIER)
    }
}

impl EffectPass for GlobalKeywordsPass {
    fn bindings(&self) -> &'static [&'static str] {
        &[
            "_ScreenParams",
            "_FrameIndex",
            "_HistoryParity",
            "_TONE_MAPPING_ON",
            "_VIGNETTE_ON",
            "_BLOOM_ON",
            "_CONTACT_SHADOWS_ON",
            "_COLOR_PYRAMID_ON",
            "_EIGHT_COLOR_ON",
            "_ContactShadowTexture",
            "_ColorPyramidTexture",
            "_PrevColorPyramidTexture",
            "_PREV_COLOR_PYRAMID_VALID",
            "_ColorPyramidParams",
            "_ContactShadowOpacity",
        ]
    }

    fn setup(&mut self, ctx: &mut SetupContext) -> Result<()> {
        let [screen_params, frame_index, history_parity] =
            ctx.bindings.ids(["_ScreenParams", "_FrameIndex", "_HistoryParity"])?;
        let [prev_pyramid_valid, pyramid_params, contact_shadow_opacity] = ctx.bindings.ids(EFFECT_STATE)?;
        self.ids = Some(GlobalIds {
            screen_params,
            frame_index,
            history_parity,
            kinds: ctx.bindings.ids(KIND_KEYWORDS)?,
            textures: ctx.bindings.ids(EFFECT_TEXTURES)?,
            prev_pyramid_valid,
            pyramid_params,
            contact_shadow_opacity,
        });
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassContext, _settings: Option<&EffectSettings>) -> Result<()> {
        let ids = resolved(self.ids, NAME)?;

        let (w, h) = (ctx.frame.width as f32, ctx.frame.height as f32);
        ctx.backend
            .set_global_vector(ids.screen_params, Vec4::new(w, h, 1.0 / w, 1.0 / h));

        let frame_index = ctx.history.frame_index(ctx.camera.key).unwrap_or(0);
        ctx.backend.set_global_float(ids.frame_index, frame_index as f32);
        ctx.backend
            .set_global_float(ids.history_parity, (frame_index % 2) as f32);

        for (kind, keyword) in SettingsKind::ALL.into_iter().zip(ids.kinds) {
            let active = ctx
                .resolver
                .resolve(kind, ctx.camera)
                .is_some_and(|resolved| resolved.is_active);
            ctx.backend.set_global_keyword(keyword, active);
        }

        for texture in ids.textures {
            ctx.backend.set_global_texture(texture, None);
        }
        ctx.backend.set_global_keyword(ids.prev_pyramid_valid, false);
        ctx.backend.set_global_vector(ids.pyramid_params, Vec4::ZERO);
        ctx.backend.set_global_float(ids.contact_shadow_opacity, 0.0);
        Ok(())
    }
}
