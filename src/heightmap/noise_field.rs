//! Layered coherent noise fields.
//!
//! Each octave samples 2D Perlin noise at a seeded per-octave domain offset,
//! with frequency growing by `lacunarity` and amplitude shrinking by
//! `persistence`. Sample coordinates are assembled in `f64` from integer
//! offsets, so two chunks that cover the same world column reproduce the
//! exact same raw sums.

use glam::{DVec2, Vec2};
use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::HeightField;

/// Smallest usable noise scale; non-positive scales are clamped to this.
pub const MIN_NOISE_SCALE: f32 = 0.0001;

/// Calibration constant for [`NormalizeMode::Global`]: the fraction of the
/// theoretical amplitude sum that summed noise is expected to actually reach.
pub const GLOBAL_NORMALIZE_ESTIMATE: f64 = 1.75;

/// Range of the per-octave random domain offset.
const OCTAVE_OFFSET_RANGE: i32 = 100_000;

/// How raw noise sums are rescaled into heights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Rescale by the observed min/max of this field. Exactly [0, 1], but
    /// adjacent fields disagree at shared edges.
    Local,
    /// Rescale by the analytic amplitude sum. Stable across fields, required
    /// for seamless streaming.
    #[default]
    Global,
}

/// Parameters for [`generate_noise_map`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub seed: i32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub octaves: i32,      // Number of summed layers
    pub persistence: f32,  // Amplitude decay per octave (0-1)
    pub lacunarity: f32,   // Frequency growth per octave (>= 1)
    pub offset: Vec2,
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Global,
        }
    }
}

impl NoiseSettings {
    /// Clamp every numeric parameter into its usable range.
    pub fn validate(&mut self) {
        if self.scale <= 0.0 || self.scale.is_nan() {
            self.scale = MIN_NOISE_SCALE;
        }
        self.octaves = self.octaves.max(0);
        self.lacunarity = if self.lacunarity.is_nan() { 1.0 } else { self.lacunarity.max(1.0) };
        self.persistence = if self.persistence.is_nan() { 0.0 } else { self.persistence.clamp(0.0, 1.0) };
    }

    /// Validated copy.
    pub fn validated(&self) -> Self {
        let mut settings = self.clone();
        settings.validate();
        settings
    }

    /// Number of octaves as a count.
    pub fn octave_count(&self) -> usize {
        self.octaves.max(0) as usize
    }

    /// Sum of all octave amplitudes, `Σ persistence^i`.
    pub fn max_possible_height(&self) -> f64 {
        let mut amplitude = 1.0_f64;
        let mut total = 0.0;
        for _ in 0..self.octave_count() {
            total += amplitude;
            amplitude *= self.persistence as f64;
        }
        total
    }
}

/// Per-octave domain offsets for a seed, shifted by the user offset and the
/// sample centre.
fn octave_offsets(settings: &NoiseSettings, sample_centre: Vec2) -> Vec<DVec2> {
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed as i64 as u64);
    (0..settings.octave_count())
        .map(|_| {
            let x = rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64;
            let y = rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64;
            DVec2::new(
                x + settings.offset.x as f64 + sample_centre.x as f64,
                y - settings.offset.y as f64 - sample_centre.y as f64,
            )
        })
        .collect()
}

/// Generate a `width × height` noise field centred on `sample_centre`.
///
/// Identical arguments always produce bit-identical output.
pub fn generate_noise_map(
    width: usize,
    height: usize,
    settings: &NoiseSettings,
    sample_centre: Vec2,
) -> HeightField {
    let settings = settings.validated();
    let perlin = Perlin::new(settings.seed as u32);
    let offsets = octave_offsets(&settings, sample_centre);

    let scale = settings.scale as f64;
    let persistence = settings.persistence as f64;
    let lacunarity = settings.lacunarity as f64;
    let half_width = width as f64 / 2.0;
    let half_height = height as f64 / 2.0;

    let mut field = HeightField::new(width, height);
    let mut min_raw = f32::MAX;
    let mut max_raw = f32::MIN;

    for y in 0..height {
        for x in 0..width {
            let mut amplitude = 1.0_f64;
            let mut frequency = 1.0_f64;
            let mut sum = 0.0_f64;

            for offset in &offsets {
                let sample_x = (x as f64 - half_width + offset.x) / scale * frequency;
                let sample_y = (y as f64 - half_height + offset.y) / scale * frequency;
                sum += perlin.get([sample_x, sample_y]) * amplitude;

                amplitude *= persistence;
                frequency *= lacunarity;
            }

            let raw = sum as f32;
            min_raw = min_raw.min(raw);
            max_raw = max_raw.max(raw);
            field.set(x, y, raw);
        }
    }

    match settings.normalize_mode {
        NormalizeMode::Local => {
            let range = max_raw - min_raw;
            for v in field.values_mut() {
                *v = if range > 0.0 { (*v - min_raw) / range } else { 0.0 };
            }
        }
        NormalizeMode::Global => {
            let max_possible = settings.max_possible_height();
            let expected_peak = 2.0 * max_possible / GLOBAL_NORMALIZE_ESTIMATE;
            for v in field.values_mut() {
                *v = if expected_peak > 0.0 {
                    (((*v as f64) + 1.0) / expected_peak).max(0.0) as f32
                } else {
                    0.0
                };
            }
        }
    }

    field
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mode: NormalizeMode) -> NoiseSettings {
        NoiseSettings {
            seed: 0,
            scale: 50.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: Vec2::ZERO,
            normalize_mode: mode,
        }
    }

    #[test]
    fn test_validate_clamps() {
        let mut s = NoiseSettings {
            scale: -3.0,
            octaves: -2,
            lacunarity: 0.5,
            persistence: 1.5,
            ..Default::default()
        };
        s.validate();
        assert_eq!(s.scale, MIN_NOISE_SCALE);
        assert_eq!(s.octaves, 0);
        assert_eq!(s.lacunarity, 1.0);
        assert_eq!(s.persistence, 1.0);
    }

    #[test]
    fn test_zero_scale_does_not_produce_nan() {
        let s = NoiseSettings { scale: 0.0, ..settings(NormalizeMode::Local) };
        let field = generate_noise_map(16, 16, &s, Vec2::ZERO);
        assert!(field.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_deterministic() {
        for mode in [NormalizeMode::Local, NormalizeMode::Global] {
            let s = NoiseSettings { seed: 1234, offset: Vec2::new(13.0, -7.5), ..settings(mode) };
            let a = generate_noise_map(40, 33, &s, Vec2::new(100.0, 50.0));
            let b = generate_noise_map(40, 33, &s, Vec2::new(100.0, 50.0));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = generate_noise_map(16, 16, &NoiseSettings { seed: 1, ..settings(NormalizeMode::Global) }, Vec2::ZERO);
        let b = generate_noise_map(16, 16, &NoiseSettings { seed: 2, ..settings(NormalizeMode::Global) }, Vec2::ZERO);
        assert_ne!(a, b);
    }

    #[test]
    fn test_local_normalization_spans_unit_range() {
        let field = generate_noise_map(64, 64, &settings(NormalizeMode::Local), Vec2::ZERO);
        let (min, max) = field.min_max();
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn test_zero_octaves_is_flat() {
        let s = NoiseSettings { octaves: 0, ..settings(NormalizeMode::Local) };
        let field = generate_noise_map(8, 8, &s, Vec2::ZERO);
        assert!(field.values().iter().all(|&v| v == 0.0));

        let s = NoiseSettings { octaves: 0, ..settings(NormalizeMode::Global) };
        let field = generate_noise_map(8, 8, &s, Vec2::ZERO);
        assert!(field.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_global_normalization_is_non_negative() {
        let field = generate_noise_map(64, 64, &settings(NormalizeMode::Global), Vec2::new(500.0, -300.0));
        assert!(field.values().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_max_possible_height() {
        let s = settings(NormalizeMode::Global);
        // 1 + 0.5 + 0.25 + 0.125
        assert!((s.max_possible_height() - 1.875).abs() < 1e-12);
    }

    /// Bordered side 243 gives a chunk world size of 240: the last interior
    /// column of one chunk is the first interior column of its +x neighbour.
    fn seam_difference(mode: NormalizeMode) -> f32 {
        let side = 243;
        let chunk_world_size = (side - 3) as f32;
        let s = settings(mode);
        let left = generate_noise_map(side, side, &s, Vec2::ZERO);
        let right = generate_noise_map(side, side, &s, Vec2::new(chunk_world_size, 0.0));

        (0..side)
            .map(|y| (left.get(side - 2, y) - right.get(1, y)).abs())
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_global_mode_seams_match() {
        assert!(seam_difference(NormalizeMode::Global) < 1e-5);
    }

    #[test]
    fn test_local_mode_seams_break() {
        assert!(seam_difference(NormalizeMode::Local) > 1e-5);
    }

    #[test]
    fn test_global_mode_seams_match_vertically() {
        let side = 243;
        let chunk_world_size = (side - 3) as f32;
        let s = settings(NormalizeMode::Global);
        let below = generate_noise_map(side, side, &s, Vec2::ZERO);
        let above = generate_noise_map(side, side, &s, Vec2::new(0.0, chunk_world_size));

        // +z maps to decreasing row index: the top interior row of the lower
        // chunk is the bottom interior row of the upper one.
        for x in 0..side {
            assert!((below.get(x, 1) - above.get(x, side - 2)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_end_to_end_reference_field_in_unit_range() {
        let field = generate_noise_map(241, 241, &settings(NormalizeMode::Local), Vec2::ZERO);
        assert_eq!(field.width(), 241);
        assert_eq!(field.height(), 241);
        assert!(field.values().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
