//! Effect Pass Implementations
//!
//! | Pass | Injection point | Settings | Notes |
//! |------|-----------------|----------|-------|
//! | [`GlobalKeywordsPass`] | `BeforeRendering` | none (global modifier) | Screen params, per-effect keywords |
//! | [`ContactShadowPass`] | `AfterRenderingOpaques` | `ContactShadow` | Needs depth + normal; tile dispatch, denoiser, history |
//! | [`ColorPyramidPass`] | `BeforeRenderingTransparents` | `ColorPyramid` | History mip chain of opaque color |
//! | [`BloomPass`] | `BeforeRenderingPostProcessing` | `Bloom` | Prefilter → blur pyramid → composite |
//! | [`ToneMappingPass`] | `BeforeRenderingPostProcessing` | `ToneMapping` | |
//! | [`VignettePass`] | `AfterRenderingPostProcessing` | `Vignette` | |
//! | [`EightColorPass`] | `AfterRenderingPostProcessing` | `EightColor` | Palette quantization |
//!
//! Passes hold only material handles and resolved binding ids; every
//! texture they touch comes from the pool, the history manager or the frame.

mod bloom;
mod color_pyramid;
mod contact_shadow;
mod eight_color;
mod global_keywords;
mod tone_mapping;
mod vignette;

pub use bloom::BloomPass;
pub use color_pyramid::ColorPyramidPass;
pub use contact_shadow::ContactShadowPass;
pub use eight_color::EightColorPass;
pub use global_keywords::GlobalKeywordsPass;
pub use tone_mapping::ToneMappingPass;
pub use vignette::VignettePass;

use crate::errors::{PostFxError, Result};
use crate::renderer::core::MaterialHandle;
use crate::renderer::graph::pass::{EffectPass, EffectPassDescriptor};

/// Materials of the standard effect set, supplied by the asset layer.
///
/// A `None` entry leaves its pass registered but unable to run: it reports a
/// configuration error and the image passes through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectMaterials {
    pub tone_mapping: Option<MaterialHandle>,
    pub vignette: Option<MaterialHandle>,
    pub bloom_prefilter: Option<MaterialHandle>,
    pub bloom_downsample: Option<MaterialHandle>,
    pub bloom_upsample: Option<MaterialHandle>,
    pub bloom_composite: Option<MaterialHandle>,
    /// Compute material; kernel 0 traces the raw mask.
    pub contact_shadow: Option<MaterialHandle>,
    /// Compute material; kernel 0 horizontal, kernel 1 vertical.
    pub contact_shadow_denoise: Option<MaterialHandle>,
    pub contact_shadow_temporal: Option<MaterialHandle>,
    pub color_pyramid: Option<MaterialHandle>,
    pub eight_color: Option<MaterialHandle>,
}

/// Every standard pass with its descriptor, in registration order.
#[must_use]
pub fn standard_passes(materials: &EffectMaterials) -> Vec<(EffectPassDescriptor, Box<dyn EffectPass>)> {
    vec![
        (GlobalKeywordsPass::descriptor(), Box::new(GlobalKeywordsPass::new())),
        (
            ContactShadowPass::descriptor(),
            Box::new(ContactShadowPass::new(
                materials.contact_shadow,
                materials.contact_shadow_denoise,
                materials.contact_shadow_temporal,
            )),
        ),
        (
            ColorPyramidPass::descriptor(),
            Box::new(ColorPyramidPass::new(materials.color_pyramid)),
        ),
        (
            BloomPass::descriptor(),
            Box::new(BloomPass::new(
                materials.bloom_prefilter,
                materials.bloom_downsample,
                materials.bloom_upsample,
                materials.bloom_composite,
            )),
        ),
        (
            ToneMappingPass::descriptor(),
            Box::new(ToneMappingPass::new(materials.tone_mapping)),
        ),
        (VignettePass::descriptor(), Box::new(VignettePass::new(materials.vignette))),
        (
            EightColorPass::descriptor(),
            Box::new(EightColorPass::new(materials.eight_color)),
        ),
    ]
}

/// Binding ids resolved in `setup`, or a configuration error.
fn resolved<T: Copy>(ids: Option<T>, pass: &str) -> Result<T> {
    ids.ok_or_else(|| PostFxError::configuration(pass, "shader bindings were not resolved"))
}

/// Settings of the expected variant, or a configuration error.
fn expect_settings<'s, T>(
    settings: Option<&'s crate::volume::EffectSettings>,
    pass: &str,
    pick: impl FnOnce(&'s crate::volume::EffectSettings) -> Option<&'s T>,
) -> Result<&'s T> {
    settings
        .and_then(pick)
        .ok_or_else(|| PostFxError::configuration(pass, "resolver returned settings of another kind"))
}
