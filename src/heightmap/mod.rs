//! Height field generation: noise, falloff, remapping and visualisation

pub mod curve;
pub mod falloff;
pub mod noise_field;
pub mod regions;
pub mod texture;

pub use curve::HeightCurve;
pub use falloff::{FalloffCache, apply_falloff, generate_falloff_map};
pub use noise_field::{NoiseSettings, NormalizeMode, generate_noise_map};
pub use regions::{RegionTable, TerrainType};
pub use texture::{colour_map_image, height_map_image, save_png};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Row-major 2D grid of height samples, indexed `(x, y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl HeightField {
    /// Zero-filled field.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width * height],
        }
    }

    /// Field filled by `f(x, y)`.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self { width, height, values }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[x + y * self.width]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.values[x + y * self.width] = value;
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Smallest and largest sample; `(0, 0)` for an empty field.
    pub fn min_max(&self) -> (f32, f32) {
        if self.values.is_empty() {
            return (0.0, 0.0);
        }
        self.values.iter().fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// Height field delivered for a chunk, with its observed range.
///
/// `values` stay normalized; `min_value`/`max_value` are mesh heights, i.e.
/// after the height curve and multiplier.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightMap {
    pub values: HeightField,
    pub min_value: f32,
    pub max_value: f32,
}

impl HeightMap {
    /// Range taken from the raw samples, as for an identity remap.
    pub fn new(values: HeightField) -> Self {
        let (min_value, max_value) = values.min_max();
        Self { values, min_value, max_value }
    }

    /// Range of the heights the mesher will emit for these samples.
    pub fn remapped(values: HeightField, curve: &HeightCurve, multiplier: f32) -> Self {
        if values.values().is_empty() {
            return Self { values, min_value: 0.0, max_value: 0.0 };
        }
        let (min_value, max_value) = values
            .values()
            .iter()
            .map(|&v| curve.evaluate(v) * multiplier)
            .fold((f32::MAX, f32::MIN), |(lo, hi), h| (lo.min(h), hi.max(h)));
        Self { values, min_value, max_value }
    }
}

/// Everything that shapes heights: noise, falloff and the mesh height remap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightMapSettings {
    pub noise: NoiseSettings,
    /// Vertical scale applied after the curve.
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
    pub use_falloff: bool,
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            height_multiplier: 30.0,
            height_curve: HeightCurve::flat_below(0.4),
            use_falloff: false,
        }
    }
}

impl HeightMapSettings {
    pub fn validate(&mut self) {
        self.noise.validate();
        if self.height_multiplier.is_nan() {
            self.height_multiplier = 0.0;
        }
    }

    /// Lowest mesh height in local (unscaled) units.
    pub fn min_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(0.0)
    }

    /// Highest mesh height in local (unscaled) units.
    pub fn max_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(1.0)
    }
}

/// Generate the height map for one chunk or preview.
///
/// `falloff` supplies the mask cache; it is only consulted when the settings
/// enable falloff.
pub fn generate_height_map(
    width: usize,
    height: usize,
    settings: &HeightMapSettings,
    sample_centre: Vec2,
    falloff: Option<&FalloffCache>,
) -> HeightMap {
    let mut values = generate_noise_map(width, height, &settings.noise, sample_centre);

    if settings.use_falloff {
        let mask = match falloff {
            Some(cache) => cache.get(width, height),
            None => std::sync::Arc::new(generate_falloff_map(width, height)),
        };
        apply_falloff(&mut values, &mask);
    }

    HeightMap::remapped(values, &settings.height_curve, settings.height_multiplier)
}
