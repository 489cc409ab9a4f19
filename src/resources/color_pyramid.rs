//! Color Pyramid Configuration
//!
//! A mip chain of the opaque scene color, kept in history so refraction and
//! screen-space reflection can sample last frame's blurred color.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorPyramidSettings {
    pub enabled: bool,
    /// Mip levels below the base level. Clamped to what the resolution allows.
    pub max_mip_levels: u32,
}

impl Default for ColorPyramidSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_mip_levels: 8,
        }
    }
}

impl ColorPyramidSettings {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled
    }
}
