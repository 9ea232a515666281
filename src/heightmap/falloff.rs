//! Edge falloff masks for island-shaped landmasses.
//!
//! A falloff mask is 0 in the middle and rises to 1 at the edges. Subtracting
//! it from a height field and clamping to [0, 1] sinks the borders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::HeightField;

/// Steepness of the falloff curve.
const FALLOFF_EXPONENT: f32 = 3.0;
/// Position of the falloff shoulder; larger pushes the ramp toward the edges.
const FALLOFF_SHIFT: f32 = 2.2;

/// Map an axis index to [-1, 1].
fn axis_coord(i: usize, n: usize) -> f32 {
    if n <= 1 {
        return 0.0;
    }
    i as f32 / (n - 1) as f32 * 2.0 - 1.0
}

/// Shape a normalized edge distance `t` in [0, 1].
fn falloff_curve(t: f32) -> f32 {
    let a = FALLOFF_EXPONENT;
    let b = FALLOFF_SHIFT;
    let inner = t.powf(a);
    let outer = (b - b * t).powf(a);
    inner / (inner + outer)
}

/// Generate a `width × height` falloff mask.
pub fn generate_falloff_map(width: usize, height: usize) -> HeightField {
    HeightField::from_fn(width, height, |x, y| {
        let u = axis_coord(x, width).abs();
        let v = axis_coord(y, height).abs();
        falloff_curve(u.max(v))
    })
}

/// Falloff masks memoized per size. Safe to share with generation workers.
#[derive(Debug, Default)]
pub struct FalloffCache {
    maps: Mutex<HashMap<(usize, usize), Arc<HeightField>>>,
}

impl FalloffCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the mask for a size, generating it on first use.
    pub fn get(&self, width: usize, height: usize) -> Arc<HeightField> {
        let mut maps = self.maps.lock().unwrap_or_else(|e| e.into_inner());
        maps.entry((width, height))
            .or_insert_with(|| {
                log::debug!("Generating {}x{} falloff mask", width, height);
                Arc::new(generate_falloff_map(width, height))
            })
            .clone()
    }

    /// Number of cached sizes.
    pub fn len(&self) -> usize {
        self.maps.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Subtract a falloff mask from a field, clamping to [0, 1].
///
/// Both fields must have the same dimensions.
pub fn apply_falloff(field: &mut HeightField, mask: &HeightField) {
    assert_eq!(
        (field.width(), field.height()),
        (mask.width(), mask.height()),
        "falloff mask size must match height field"
    );
    for (v, m) in field.values_mut().iter_mut().zip(mask.values()) {
        *v = (*v - m).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_in_unit_range() {
        let map = generate_falloff_map(50, 50);
        assert!(map.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_symmetric() {
        let n = 37;
        let map = generate_falloff_map(n, n);
        for y in 0..n {
            for x in 0..n {
                let v = map.get(x, y);
                assert!((v - map.get(n - 1 - x, y)).abs() < 1e-6);
                assert!((v - map.get(x, n - 1 - y)).abs() < 1e-6);
                assert!((v - map.get(y, x)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_increases_toward_edges() {
        let n = 41;
        let map = generate_falloff_map(n, n);
        let mid = n / 2;
        assert!(map.get(mid, mid) < 1e-3);
        assert!((map.get(0, mid) - 1.0).abs() < 1e-6);
        for x in mid..n - 1 {
            assert!(map.get(x + 1, mid) >= map.get(x, mid));
        }
    }

    #[test]
    fn test_cache_reuses_masks() {
        let cache = FalloffCache::new();
        let a = cache.get(32, 32);
        let b = cache.get(32, 32);
        assert!(Arc::ptr_eq(&a, &b));
        cache.get(16, 16);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_apply_falloff_clamps() {
        let mut field = HeightField::from_fn(3, 3, |_, _| 0.5);
        let mask = HeightField::from_fn(3, 3, |x, _| x as f32 * 0.5);
        apply_falloff(&mut field, &mask);
        assert_eq!(field.get(0, 0), 0.5);
        assert_eq!(field.get(1, 0), 0.0);
        assert_eq!(field.get(2, 0), 0.0);
    }
}
