//! Priority-Ordered Volume Stack
//!
//! A [`VolumeStack`] holds override volumes. Each volume may be global or
//! bounded by an axis-aligned box, carries a priority and overrides any
//! number of effect components.
//!
//! # Resolution
//!
//! For a given kind and camera:
//!
//! 1. Keep the volumes that contain the camera position (global volumes
//!    always do) and carry a component of that kind.
//! 2. The highest priority wins; among equal priorities the volume added
//!    last wins.
//! 3. The winner's component is returned whole. Components are not blended.
//! 4. With no candidate the kind's defaults are returned.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{EffectSettings, ResolvedSettings, SettingsKind, VolumeResolver};
use crate::errors::Result;
use crate::renderer::graph::context::CameraView;

/// One override region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeOverride {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    /// Opposite corners. `None` makes the volume global. Corners are
    /// normalized on load and in [`contains`](Self::contains), so either
    /// order works.
    #[serde(default)]
    pub bounds: Option<(Vec3, Vec3)>,
    #[serde(default)]
    pub components: Vec<EffectSettings>,
}

impl VolumeOverride {
    #[must_use]
    pub fn global(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            bounds: None,
            components: Vec::new(),
        }
    }

    #[must_use]
    pub fn bounded(name: impl Into<String>, priority: i32, min: Vec3, max: Vec3) -> Self {
        Self {
            name: name.into(),
            priority,
            bounds: Some((min.min(max), min.max(max))),
            components: Vec::new(),
        }
    }

    /// Adds or replaces the component of `settings`' kind.
    #[must_use]
    pub fn with(mut self, settings: EffectSettings) -> Self {
        self.components.retain(|c| c.kind() != settings.kind());
        self.components.push(settings);
        self
    }

    #[must_use]
    pub fn contains(&self, position: Vec3) -> bool {
        match self.bounds {
            None => true,
            Some((a, b)) => position.cmpge(a.min(b)).all() && position.cmple(a.max(b)).all(),
        }
    }

    #[must_use]
    pub fn component(&self, kind: SettingsKind) -> Option<&EffectSettings> {
        self.components.iter().find(|c| c.kind() == kind)
    }
}

/// Default [`VolumeResolver`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeStack {
    volumes: Vec<VolumeOverride>,
}

impl VolumeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of volumes.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut volumes: Vec<VolumeOverride> = serde_json::from_str(json)?;
        for volume in &mut volumes {
            if let Some((a, b)) = volume.bounds {
                volume.bounds = Some((a.min(b), a.max(b)));
            }
        }
        Ok(Self { volumes })
    }

    pub fn push(&mut self, volume: VolumeOverride) {
        self.volumes.push(volume);
    }

    #[must_use]
    pub fn with_volume(mut self, volume: VolumeOverride) -> Self {
        self.volumes.push(volume);
        self
    }

    /// Removes every volume called `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.volumes.len();
        self.volumes.retain(|v| v.name != name);
        before - self.volumes.len()
    }

    #[must_use]
    pub fn volumes(&self) -> &[VolumeOverride] {
        &self.volumes
    }

    /// Winning component for `kind` at `position`, if any volume overrides it.
    #[must_use]
    pub fn winning_component(&self, kind: SettingsKind, position: Vec3) -> Option<&EffectSettings> {
        let mut best: Option<(i32, &EffectSettings)> = None;
        for volume in &self.volumes {
            if !volume.contains(position) {
                continue;
            }
            let Some(component) = volume.component(kind) else {
                continue;
            };
            if best.is_none_or(|(p, _)| volume.priority >= p) {
                best = Some((volume.priority, component));
            }
        }
        best.map(|(_, c)| c)
    }
}

impl VolumeResolver for VolumeStack {
    fn resolve(&self, kind: SettingsKind, camera: &CameraView) -> Option<ResolvedSettings> {
        let settings = self
            .winning_component(kind, camera.position)
            .copied()
            .unwrap_or_else(|| kind.default_settings());
        Some(ResolvedSettings::new(settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{BloomSettings, VignetteSettings};

    fn bloom(intensity: f32) -> EffectSettings {
        EffectSettings::Bloom(BloomSettings {
            intensity,
            ..Default::default()
        })
    }

    #[test]
    fn higher_priority_wins() {
        let mut stack = VolumeStack::new();
        stack.push(VolumeOverride::global("high", 10).with(bloom(2.0)));
        stack.push(VolumeOverride::global("low", 0).with(bloom(1.0)));
        let won = stack.winning_component(SettingsKind::Bloom, Vec3::ZERO).unwrap();
        assert_eq!(won.as_bloom().unwrap().intensity, 2.0);
    }

    #[test]
    fn equal_priority_prefers_later_volume() {
        let mut stack = VolumeStack::new();
        stack.push(VolumeOverride::global("first", 1).with(bloom(1.0)));
        stack.push(VolumeOverride::global("second", 1).with(bloom(3.0)));
        let won = stack.winning_component(SettingsKind::Bloom, Vec3::ZERO).unwrap();
        assert_eq!(won.as_bloom().unwrap().intensity, 3.0);
    }

    #[test]
    fn bounded_volume_applies_only_inside() {
        let mut stack = VolumeStack::new();
        stack.push(VolumeOverride::bounded("room", 5, Vec3::splat(-1.0), Vec3::splat(1.0)).with(bloom(4.0)));
        assert!(stack.winning_component(SettingsKind::Bloom, Vec3::ZERO).is_some());
        assert!(stack.winning_component(SettingsKind::Bloom, Vec3::splat(2.0)).is_none());
    }

    #[test]
    fn with_replaces_component_of_same_kind() {
        let v = VolumeOverride::global("v", 0)
            .with(bloom(1.0))
            .with(EffectSettings::Vignette(VignetteSettings::default()))
            .with(bloom(2.0));
        assert_eq!(v.components.len(), 2);
        assert_eq!(v.component(SettingsKind::Bloom), Some(&bloom(2.0)));
    }

    #[test]
    fn remove_drops_named_volumes() {
        let mut stack = VolumeStack::new();
        stack.push(VolumeOverride::global("a", 0));
        stack.push(VolumeOverride::global("b", 0));
        assert_eq!(stack.remove("a"), 1);
        assert_eq!(stack.volumes().len(), 1);
    }
}
