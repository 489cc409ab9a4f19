//! Bloom Configuration
//!
//! Bloom extracts the bright parts of the frame (`threshold`), blurs them
//! with a hierarchical pyramid and adds the result back on top of the scene.
//!
//! | Field | Effect |
//! |-------|--------|
//! | `intensity` | Strength of the composite; `0` disables bloom |
//! | `threshold` | Luminance below which pixels do not bloom |
//! | `scatter` | How much each upsample level spreads into the next |
//! | `blur_radius` | Added to `log2(resolution)` when choosing the pyramid depth |
//! | `max_iterations` | Hard cap on pyramid depth |
//! | `tint` | Color multiplier of the bloom contribution |

use glam::Vec4;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub intensity: f32,
    pub threshold: f32,
    pub scatter: f32,
    pub blur_radius: f32,
    pub max_iterations: u32,
    pub tint: Vec4,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            threshold: 0.9,
            scatter: 0.7,
            blur_radius: 4.0,
            max_iterations: 8,
            tint: Vec4::ONE,
        }
    }
}

impl BloomSettings {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.intensity > 0.0
    }
}
