//! Volume Parameter Resolution
//!
//! Effect passes never read settings directly. Once per camera frame the
//! scheduler asks a [`VolumeResolver`] for each pass's [`SettingsKind`] and
//! hands the answer to exactly one setup + execute call. Nothing is cached
//! across frames.
//!
//! The resolver is an opaque contract: any implementation that maps
//! `(kind, camera)` to a settings value and an activity flag will do. The
//! crate ships [`VolumeStack`], a priority-ordered override stack.

pub mod stack;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use stack::{VolumeOverride, VolumeStack};

use crate::renderer::graph::context::CameraView;
use crate::resources::{
    BloomSettings, ColorPyramidSettings, ContactShadowSettings, EightColorSettings,
    ToneMappingSettings, VignetteSettings,
};

/// Discriminant of an [`EffectSettings`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SettingsKind {
    ToneMapping,
    Vignette,
    Bloom,
    ContactShadow,
    ColorPyramid,
    EightColor,
}

impl SettingsKind {
    pub const ALL: [SettingsKind; 6] = [
        Self::ToneMapping,
        Self::Vignette,
        Self::Bloom,
        Self::ContactShadow,
        Self::ColorPyramid,
        Self::EightColor,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ToneMapping => "ToneMapping",
            Self::Vignette => "Vignette",
            Self::Bloom => "Bloom",
            Self::ContactShadow => "ContactShadow",
            Self::ColorPyramid => "ColorPyramid",
            Self::EightColor => "EightColor",
        }
    }

    /// Default value of this kind's settings.
    #[must_use]
    pub fn default_settings(self) -> EffectSettings {
        match self {
            Self::ToneMapping => EffectSettings::ToneMapping(ToneMappingSettings::default()),
            Self::Vignette => EffectSettings::Vignette(VignetteSettings::default()),
            Self::Bloom => EffectSettings::Bloom(BloomSettings::default()),
            Self::ContactShadow => EffectSettings::ContactShadow(ContactShadowSettings::default()),
            Self::ColorPyramid => EffectSettings::ColorPyramid(ColorPyramidSettings::default()),
            Self::EightColor => EffectSettings::EightColor(EightColorSettings::default()),
        }
    }
}

impl fmt::Display for SettingsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One effect's resolved parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectSettings {
    ToneMapping(ToneMappingSettings),
    Vignette(VignetteSettings),
    Bloom(BloomSettings),
    ContactShadow(ContactShadowSettings),
    ColorPyramid(ColorPyramidSettings),
    EightColor(EightColorSettings),
}

impl EffectSettings {
    #[must_use]
    pub fn kind(&self) -> SettingsKind {
        match self {
            Self::ToneMapping(_) => SettingsKind::ToneMapping,
            Self::Vignette(_) => SettingsKind::Vignette,
            Self::Bloom(_) => SettingsKind::Bloom,
            Self::ContactShadow(_) => SettingsKind::ContactShadow,
            Self::ColorPyramid(_) => SettingsKind::ColorPyramid,
            Self::EightColor(_) => SettingsKind::EightColor,
        }
    }

    /// Whether the values would produce a visible change.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self {
            Self::ToneMapping(s) => s.is_active(),
            Self::Vignette(s) => s.is_active(),
            Self::Bloom(s) => s.is_active(),
            Self::ContactShadow(s) => s.is_active(),
            Self::ColorPyramid(s) => s.is_active(),
            Self::EightColor(s) => s.is_active(),
        }
    }

    #[must_use]
    pub fn as_tone_mapping(&self) -> Option<&ToneMappingSettings> {
        match self {
            Self::ToneMapping(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vignette(&self) -> Option<&VignetteSettings> {
        match self {
            Self::Vignette(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bloom(&self) -> Option<&BloomSettings> {
        match self {
            Self::Bloom(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_contact_shadow(&self) -> Option<&ContactShadowSettings> {
        match self {
            Self::ContactShadow(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_color_pyramid(&self) -> Option<&ColorPyramidSettings> {
        match self {
            Self::ColorPyramid(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_eight_color(&self) -> Option<&EightColorSettings> {
        match self {
            Self::EightColor(s) => Some(s),
            _ => None,
        }
    }
}

/// Resolver output for one pass and camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedSettings {
    pub settings: EffectSettings,
    pub is_active: bool,
}

impl ResolvedSettings {
    /// Wraps `settings`, deriving `is_active` from the values.
    #[must_use]
    pub fn new(settings: EffectSettings) -> Self {
        Self {
            is_active: settings.is_active(),
            settings,
        }
    }
}

/// `resolve(kind, camera) → (settings, is_active)`.
///
/// `None` means the resolver knows nothing about `kind`; the scheduler
/// treats that pass as inactive.
pub trait VolumeResolver {
    fn resolve(&self, kind: SettingsKind, camera: &CameraView) -> Option<ResolvedSettings>;
}

/// Resolver that reports every kind at its default (inactive) values.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResolver;

impl VolumeResolver for DefaultResolver {
    fn resolve(&self, kind: SettingsKind, _camera: &CameraView) -> Option<ResolvedSettings> {
        Some(ResolvedSettings::new(kind.default_settings()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_inactive_except_tone_mapping() {
        for kind in SettingsKind::ALL {
            let settings = kind.default_settings();
            assert_eq!(settings.kind(), kind);
            assert_eq!(settings.is_active(), kind == SettingsKind::ToneMapping, "{kind}");
        }
    }

    #[test]
    fn accessors_match_variant() {
        let s = EffectSettings::Bloom(BloomSettings::default());
        assert!(s.as_bloom().is_some());
        assert!(s.as_vignette().is_none());
    }
}
