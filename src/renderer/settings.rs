//! Pipeline Settings
//!
//! Build-time configuration of a [`PostFxPipeline`](crate::renderer::PostFxPipeline).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_postfx::PipelineSettings;
//!
//! // Defaults: 16 pyramid levels, double-buffered history
//! let settings = PipelineSettings::default();
//!
//! // From a JSON file, unspecified fields keep their defaults
//! let settings = PipelineSettings::from_json(r#"{ "history_buffer_count": 3 }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::renderer::graph::blur::MAX_PYRAMID_LEVELS;

// ---------------------------------------------------------------------------
// PipelineSettings
// ---------------------------------------------------------------------------

/// Pipeline-wide configuration.
///
/// | Field | Default | Effect |
/// |-------|---------|--------|
/// | `max_blur_levels` | 16 | Cap on every blur pyramid's depth (2..=16) |
/// | `history_buffer_count` | 2 | Buffers per history slot; `< 2` disables temporal reuse |
/// | `pool_trim_interval` | 60 | Frames between pool trims; 0 disables trimming |
/// | `pool_max_idle_frames` | 120 | Idle frames after which a pooled target is released |
/// | `auto_register_cameras` | `true` | Unknown cameras are registered on first render |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_blur_levels: u32,
    pub history_buffer_count: u32,
    pub pool_trim_interval: u64,
    pub pool_max_idle_frames: u32,
    pub auto_register_cameras: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_blur_levels: MAX_PYRAMID_LEVELS,
            history_buffer_count: 2,
            pool_trim_interval: 60,
            pool_max_idle_frames: 120,
            auto_register_cameras: true,
        }
    }
}

impl PipelineSettings {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// `max_blur_levels` clamped to the supported range.
    #[must_use]
    pub fn blur_level_cap(&self) -> u32 {
        self.max_blur_levels.clamp(2, MAX_PYRAMID_LEVELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PostFxError;

    #[test]
    fn partial_json_keeps_defaults() {
        let s = PipelineSettings::from_json(r#"{ "history_buffer_count": 3 }"#).unwrap();
        assert_eq!(s.history_buffer_count, 3);
        assert_eq!(s.max_blur_levels, MAX_PYRAMID_LEVELS);
        assert!(s.auto_register_cameras);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = PipelineSettings::from_json("{ nope").unwrap_err();
        assert!(matches!(err, PostFxError::Config(_)));
    }

    #[test]
    fn blur_cap_is_clamped() {
        let s = PipelineSettings {
            max_blur_levels: 40,
            ..Default::default()
        };
        assert_eq!(s.blur_level_cap(), MAX_PYRAMID_LEVELS);
    }
}
