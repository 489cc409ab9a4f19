//! Effect Settings
//!
//! Per-effect parameter sets as pure data. They carry no GPU state, derive
//! `serde` so volume profiles can be authored as JSON, and each exposes
//! `is_active()`: the condition under which its pass records any work.

pub mod bloom;
pub mod color_pyramid;
pub mod contact_shadow;
pub mod eight_color;
pub mod tone_mapping;
pub mod vignette;

pub use bloom::BloomSettings;
pub use color_pyramid::ColorPyramidSettings;
pub use contact_shadow::ContactShadowSettings;
pub use eight_color::EightColorSettings;
pub use tone_mapping::{ToneMappingMode, ToneMappingSettings};
pub use vignette::VignetteSettings;
