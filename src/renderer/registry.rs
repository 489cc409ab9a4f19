//! Camera- and Light-Keyed Registries
//!
//! Maps the identity of an external object (a camera, a light) to auxiliary
//! data owned by the pipeline. Records are created on registration and removed
//! on unregistration; nothing is cleaned up implicitly.
//!
//! Invariant: at most one record per key at any time. Registering an existing
//! key replaces the record and hands the previous one back to the caller.

use glam::Vec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Identity of an external camera.
///
/// The pipeline never interprets the value; it only uses it to key
/// per-camera state (history slots, post-process contexts).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CameraKey(pub u64);

/// Identity of an external light.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LightKey(pub u64);

/// Per-light data consumed by screen-space effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdditionalLightData {
    /// Normalized direction the light travels in (world space).
    pub direction: Vec3,
    /// Whether this light casts contact shadows.
    pub contact_shadows: bool,
    /// Shadow strength multiplier in `[0, 1]`.
    pub shadow_strength: f32,
}

impl Default for AdditionalLightData {
    fn default() -> Self {
        Self {
            direction: Vec3::NEG_Y,
            contact_shadows: false,
            shadow_strength: 1.0,
        }
    }
}

/// A map from an external key to exactly one auxiliary record.
#[derive(Debug, Clone)]
pub struct KeyedRegistry<K, V> {
    records: FxHashMap<K, V>,
}

impl<K, V> Default for KeyedRegistry<K, V> {
    fn default() -> Self {
        Self {
            records: FxHashMap::default(),
        }
    }
}

impl<K, V> KeyedRegistry<K, V>
where
    K: Copy + Eq + std::hash::Hash + Ord,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `key`, returning the record it replaced.
    pub fn register(&mut self, key: K, value: V) -> Option<V> {
        self.records.insert(key, value)
    }

    /// Returns the record for `key`, creating it with `make` if absent.
    pub fn get_or_register_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        self.records.entry(key).or_insert_with(make)
    }

    /// Removes and returns the record for `key`.
    pub fn unregister(&mut self, key: K) -> Option<V> {
        self.records.remove(&key)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: K) -> Option<&V> {
        self.records.get(&key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.records.get_mut(&key)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.records.contains_key(&key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in ascending key order.
    ///
    /// Hash-map order depends on insertion history, so anything that feeds
    /// GPU work goes through this to keep recording deterministic.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (K, &V)> {
        let mut keys: Vec<K> = self.records.keys().copied().collect();
        keys.sort_unstable();
        keys.into_iter().map(move |k| (k, &self.records[&k]))
    }

    /// Removes every record, yielding them in key order.
    pub fn drain_sorted(&mut self) -> Vec<(K, V)> {
        let mut drained: Vec<(K, V)> = self.records.drain().collect();
        drained.sort_unstable_by_key(|(k, _)| *k);
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_replaces_existing_record() {
        let mut reg = KeyedRegistry::new();
        assert!(reg.register(CameraKey(1), "a").is_none());
        assert_eq!(reg.register(CameraKey(1), "b"), Some("a"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(CameraKey(1)), Some(&"b"));
    }

    #[test]
    fn unregister_removes_record() {
        let mut reg = KeyedRegistry::new();
        reg.register(LightKey(7), AdditionalLightData::default());
        assert!(reg.unregister(LightKey(7)).is_some());
        assert!(reg.unregister(LightKey(7)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn iter_sorted_is_key_ordered() {
        let mut reg = KeyedRegistry::new();
        for k in [5, 1, 9, 3] {
            reg.register(CameraKey(k), k * 10);
        }
        let keys: Vec<u64> = reg.iter_sorted().map(|(k, _)| k.0).collect();
        assert_eq!(keys, vec![1, 3, 5, 9]);
    }
}
