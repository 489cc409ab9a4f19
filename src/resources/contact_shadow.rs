//! Contact Shadow Configuration
//!
//! Screen-space ray marching towards each contact-shadow light, followed by a
//! separable denoiser and optional temporal accumulation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactShadowSettings {
    pub enabled: bool,
    /// Final shadow opacity in `[0, 1]`.
    pub opacity: f32,
    /// World-space march length.
    pub length: f32,
    /// Distance from the camera at which shadows start fading out.
    pub max_distance: f32,
    /// Depth thickness assumed for each depth buffer sample.
    pub thickness: f32,
    /// Steps per ray.
    pub sample_count: u32,
    /// Run the separable denoiser over the raw mask.
    pub denoise: bool,
    /// Blend with the previous frame's mask when available.
    pub temporal: bool,
}

impl Default for ContactShadowSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            opacity: 1.0,
            length: 0.15,
            max_distance: 50.0,
            thickness: 0.05,
            sample_count: 16,
            denoise: true,
            temporal: true,
        }
    }
}

impl ContactShadowSettings {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.opacity > 0.0
    }
}
