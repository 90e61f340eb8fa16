//! Per-emitter tint cache.
//!
//! A particle's tint is a blend of its start and end colors by life fraction.
//! Blends are memoized under the particle's remaining life rounded to four
//! decimal places, so particles of one emitter that share a life value also
//! share the tint computed for whichever of them got there first.

use std::collections::HashMap;

use glam::Vec3;

/// Quantization applied to remaining life before it becomes a key.
const KEY_SCALE: f32 = 10_000.0;

/// Memoized tints keyed by quantized remaining life.
#[derive(Debug, Default, Clone)]
pub struct TintCache {
    entries: HashMap<i64, Vec3>,
}

impl TintCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached tint for `life`, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, life: f32, compute: impl FnOnce() -> Vec3) -> Vec3 {
        *self.entries.entry(key(life)).or_insert_with(compute)
    }

    /// Cached tint for `life`, if present.
    pub fn get(&self, life: f32) -> Option<Vec3> {
        self.entries.get(&key(life)).copied()
    }

    /// Number of cached tints.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached tint.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[inline]
fn key(life: f32) -> i64 {
    (life * KEY_SCALE).round() as i64
}

/// Blend two 0-255 colors by `t` in `[0, 1]`, returning 0-1 channels.
pub fn blend(start: [f32; 3], end: [f32; 3], t: f32) -> Vec3 {
    (Vec3::from(end) * t + Vec3::from(start) * (1.0 - t)) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_endpoints() {
        let start = [255.0, 0.0, 255.0];
        let end = [0.0, 0.0, 255.0];
        assert!(blend(start, end, 0.0).abs_diff_eq(Vec3::new(1.0, 0.0, 1.0), 1e-6));
        assert!(blend(start, end, 1.0).abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-6));
        assert!(blend(start, end, 0.5).abs_diff_eq(Vec3::new(0.5, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn test_hit_returns_first_value() {
        let mut cache = TintCache::new();
        let first = cache.get_or_insert_with(0.25, || Vec3::X);
        let second = cache.get_or_insert_with(0.25, || Vec3::Y);
        assert_eq!(first, Vec3::X);
        assert_eq!(second, Vec3::X);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_rounds_to_four_decimals() {
        let mut cache = TintCache::new();
        cache.get_or_insert_with(0.123_41, || Vec3::Z);
        assert_eq!(cache.get(0.123_44), Some(Vec3::Z));
        assert_eq!(cache.get(0.123_6), None);
    }

    #[test]
    fn test_clear_empties_cache() {
        let mut cache = TintCache::new();
        cache.get_or_insert_with(0.5, || Vec3::ONE);
        cache.clear();
        assert!(cache.is_empty());
    }
}
