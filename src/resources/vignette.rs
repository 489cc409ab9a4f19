//! Vignette Configuration

use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

/// Edge darkening around a center point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VignetteSettings {
    /// Darkening strength in `[0, 1]`. Zero disables the effect.
    pub intensity: f32,
    /// Falloff softness in `[0.01, 1]`.
    pub smoothness: f32,
    /// Center in normalized screen coordinates.
    pub center: Vec2,
    /// Color the edges fade towards.
    pub color: Vec4,
}

impl Default for VignetteSettings {
    fn default() -> Self {
        Self {
            intensity: 0.0,
            smoothness: 0.2,
            center: Vec2::splat(0.5),
            color: Vec4::new(0.0, 0.0, 0.0, 1.0),
        }
    }
}

impl VignetteSettings {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.intensity > 0.0
    }
}
