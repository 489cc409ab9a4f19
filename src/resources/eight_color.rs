//! Eight-Color Stylization Configuration
//!
//! Quantizes the frame to an eight-entry palette with optional ordered
//! dithering and pixelation.

use glam::Vec4;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EightColorSettings {
    /// Blend between the original and the quantized image. Zero disables the effect.
    pub opacity: f32,
    pub palette: [Vec4; 8],
    /// Ordered dither amplitude.
    pub dithering: f32,
    /// Pixelation factor; 1 keeps full resolution.
    pub downsampling: u32,
}

impl Default for EightColorSettings {
    fn default() -> Self {
        Self {
            opacity: 0.0,
            palette: [
                Vec4::new(0.0, 0.0, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec4::new(0.0, 1.0, 0.0, 1.0),
                Vec4::new(0.0, 0.0, 1.0, 1.0),
                Vec4::new(1.0, 1.0, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 1.0, 1.0),
                Vec4::new(0.0, 1.0, 1.0, 1.0),
                Vec4::new(1.0, 1.0, 1.0, 1.0),
            ],
            dithering: 0.05,
            downsampling: 1,
        }
    }
}

impl EightColorSettings {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.opacity > 0.0
    }
}
