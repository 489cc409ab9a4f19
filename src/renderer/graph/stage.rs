//! Injection Points
//!
//! `InjectionPoint` names the moment in a camera's frame at which an effect
//! pass runs. The order is a fixed public contract: passes execute in
//! non-decreasing injection point order, ties broken by registration order.

use serde::{Deserialize, Serialize};

/// Ordering tag for effect passes.
///
/// # Point Overview
///
/// | Point | Typical Content |
/// |-------|-----------------|
/// | `BeforeRendering` | Per-frame global setup |
/// | `BeforeGBuffer` | Depth/normal prepass consumers |
/// | `AfterRenderingOpaques` | Contact shadows, SSAO |
/// | `AfterRenderingSkybox` | Effects that must see the sky |
/// | `BeforeRenderingTransparents` | Color pyramid for refraction |
/// | `BeforeRenderingPostProcessing` | Bloom, tone mapping |
/// | `AfterRenderingPostProcessing` | Vignette, stylization |
/// | `AfterRendering` | Overlays, debug views |
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum InjectionPoint {
    BeforeRendering = 0,
    BeforeGBuffer = 1,
    AfterRenderingOpaques = 2,
    AfterRenderingSkybox = 3,
    BeforeRenderingTransparents = 4,
    BeforeRenderingPostProcessing = 5,
    AfterRenderingPostProcessing = 6,
    AfterRendering = 7,
}

impl InjectionPoint {
    /// Every point, in execution order.
    pub const ALL: [InjectionPoint; 8] = [
        Self::BeforeRendering,
        Self::BeforeGBuffer,
        Self::AfterRenderingOpaques,
        Self::AfterRenderingSkybox,
        Self::BeforeRenderingTransparents,
        Self::BeforeRenderingPostProcessing,
        Self::AfterRenderingPostProcessing,
        Self::AfterRendering,
    ];

    /// Numeric index (used for sorting).
    #[inline]
    #[must_use]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Point name (for debugging).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeRendering => "BeforeRendering",
            Self::BeforeGBuffer => "BeforeGBuffer",
            Self::AfterRenderingOpaques => "AfterRenderingOpaques",
            Self::AfterRenderingSkybox => "AfterRenderingSkybox",
            Self::BeforeRenderingTransparents => "BeforeRenderingTransparents",
            Self::BeforeRenderingPostProcessing => "BeforeRenderingPostProcessing",
            Self::AfterRenderingPostProcessing => "AfterRenderingPostProcessing",
            Self::AfterRendering => "AfterRendering",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injection_point_ordering() {
        for pair in InjectionPoint::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0].name(), pair[1].name());
            assert_eq!(pair[0].order() + 1, pair[1].order());
        }
    }
}
