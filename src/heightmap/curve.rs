//! Keyframed height remapping curve.
//!
//! [`HeightCurve`] maps a normalized height sample to a shaped height before
//! the mesher multiplies it by the height multiplier. Typical use flattens
//! water and lowlands while keeping peaks sharp.

use serde::{Deserialize, Serialize};

/// Piecewise-linear curve over `(input, output)` keys.
///
/// Keys are sorted by input. Sampling below the first key or above the last
/// key returns that key's output.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightCurve {
    keys: Vec<(f32, f32)>,
}

impl HeightCurve {
    /// Create a new curve from unsorted keys. Keys are sorted by input.
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        keys.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self { keys }
    }

    /// Identity curve over [0, 1].
    pub fn linear() -> Self {
        Self::new(vec![(0.0, 0.0), (1.0, 1.0)])
    }

    /// Curve that holds everything below `water_level` at zero and ramps
    /// linearly to 1 above it.
    pub fn flat_below(water_level: f32) -> Self {
        let water_level = water_level.clamp(0.0, 1.0);
        Self::new(vec![(0.0, 0.0), (water_level, 0.0), (1.0, 1.0)])
    }

    /// Sorted keys.
    pub fn keys(&self) -> &[(f32, f32)] {
        &self.keys
    }

    /// True when outputs never decrease as inputs increase.
    pub fn is_monotonic(&self) -> bool {
        self.keys.windows(2).all(|w| w[1].1 >= w[0].1)
    }

    /// Evaluate the curve at `t`.
    pub fn evaluate(&self, t: f32) -> f32 {
        let Some(&(first_t, first_v)) = self.keys.first() else {
            return t;
        };
        if t <= first_t {
            return first_v;
        }

        // First key strictly above t
        match self.keys.iter().position(|k| k.0 > t) {
            Some(idx) => {
                let (t_a, v_a) = self.keys[idx - 1];
                let (t_b, v_b) = self.keys[idx];
                let span = t_b - t_a;
                if span < 1e-6 {
                    return v_a;
                }
                v_a + (v_b - v_a) * ((t - t_a) / span)
            }
            None => self.keys[self.keys.len() - 1].1,
        }
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl Serialize for HeightCurve {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.keys.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HeightCurve {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let keys = Vec::<(f32, f32)>::deserialize(deserializer)?;
        Ok(Self::new(keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_linear_is_identity() {
        let curve = HeightCurve::linear();
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            assert!(approx_eq(curve.evaluate(t), t));
        }
    }

    #[test]
    fn test_clamps_outside_keys() {
        let curve = HeightCurve::new(vec![(0.2, 0.1), (0.8, 0.9)]);
        assert_eq!(curve.evaluate(-5.0), 0.1);
        assert_eq!(curve.evaluate(0.0), 0.1);
        assert_eq!(curve.evaluate(1.0), 0.9);
        assert_eq!(curve.evaluate(3.0), 0.9);
    }

    #[test]
    fn test_unsorted_keys_are_sorted() {
        let curve = HeightCurve::new(vec![(1.0, 1.0), (0.0, 0.0), (0.5, 0.25)]);
        assert_eq!(curve.keys()[0], (0.0, 0.0));
        assert!(approx_eq(curve.evaluate(0.25), 0.125));
        assert!(approx_eq(curve.evaluate(0.75), 0.625));
    }

    #[test]
    fn test_flat_below_water() {
        let curve = HeightCurve::flat_below(0.4);
        assert_eq!(curve.evaluate(0.1), 0.0);
        assert_eq!(curve.evaluate(0.4), 0.0);
        assert!(approx_eq(curve.evaluate(0.7), 0.5));
        assert!(curve.is_monotonic());
    }

    #[test]
    fn test_monotonic_detection() {
        let curve = HeightCurve::new(vec![(0.0, 0.0), (0.5, 1.0), (1.0, 0.5)]);
        assert!(!curve.is_monotonic());
    }

    #[test]
    fn test_serde_roundtrip_sorts() {
        let curve: HeightCurve = serde_json::from_str("[[1.0, 1.0], [0.0, 0.0]]").unwrap();
        assert_eq!(curve, HeightCurve::linear());
    }
}
