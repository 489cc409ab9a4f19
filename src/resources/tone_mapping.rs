//! Tone Mapping Configuration
//!
//! Tone mapping modes and settings as pure data. The tone mapping pass maps
//! HDR scene color into display range; these settings select the curve and
//! the exposure applied before it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Curve used by the tone mapping pass.
///
/// Each mode other than [`Linear`](Self::Linear) maps to one shader keyword;
/// the pass enables exactly that keyword and disables the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToneMappingMode {
    /// Identity curve. With unit exposure the pass is inactive.
    Linear,
    #[default]
    Neutral,
    Reinhard,
    AcesFilmic,
    AgX,
}

impl ToneMappingMode {
    /// Shader keyword enabled for this mode. `None` for [`Linear`](Self::Linear).
    #[must_use]
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::Linear => None,
            Self::Neutral => Some("_TONEMAP_NEUTRAL"),
            Self::Reinhard => Some("_TONEMAP_REINHARD"),
            Self::AcesFilmic => Some("_TONEMAP_ACES"),
            Self::AgX => Some("_TONEMAP_AGX"),
        }
    }
}

impl fmt::Display for ToneMappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Linear => "linear",
            Self::Neutral => "neutral",
            Self::Reinhard => "reinhard",
            Self::AcesFilmic => "aces",
            Self::AgX => "agx",
        })
    }
}

/// Tone mapping configuration.
///
/// Active whenever the mode is not [`ToneMappingMode::Linear`] or the
/// exposure differs from 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    pub mode: ToneMappingMode,
    /// Linear exposure multiplier applied before the curve.
    pub exposure: f32,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            mode: ToneMappingMode::Neutral,
            exposure: 1.0,
        }
    }
}

impl ToneMappingSettings {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.mode != ToneMappingMode::Linear || (self.exposure - 1.0).abs() > f32::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_at_unit_exposure_is_identity() {
        let identity = ToneMappingSettings {
            mode: ToneMappingMode::Linear,
            exposure: 1.0,
        };
        assert!(!identity.is_active());
        assert!(ToneMappingSettings { exposure: 2.0, ..identity }.is_active());
        assert!(ToneMappingSettings::default().is_active());
    }

    #[test]
    fn modes_parse_from_profile_names() {
        let mode: ToneMappingMode = serde_json::from_str("\"AcesFilmic\"").unwrap();
        assert_eq!(mode, ToneMappingMode::AcesFilmic);
        assert_eq!(mode.keyword(), Some("_TONEMAP_ACES"));
    }
}
