//! Axis-aligned rectangle on the terrain plane

use crate::core::types::Vec2;

/// Axis-aligned rectangle defined by min and max corners (XZ plane)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds2 {
    /// Create bounds from min and max corners
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Create bounds from center and full size
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Get center point
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Check if point is inside the bounds (edges inclusive)
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y
    }

    /// Closest point of the bounds to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min, self.max)
    }

    /// Squared distance from `p` to the nearest edge; zero inside
    pub fn sqr_distance(&self, p: Vec2) -> f32 {
        self.closest_point(p).distance_squared(p)
    }

    /// Distance from `p` to the nearest edge; zero inside
    pub fn distance(&self, p: Vec2) -> f32 {
        self.sqr_distance(p).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let b = Bounds2::new(Vec2::ZERO, Vec2::splat(2.0));
        assert_eq!(b.center(), Vec2::ONE);
        assert_eq!(b.size(), Vec2::splat(2.0));
    }

    #[test]
    fn test_from_center_size() {
        let b = Bounds2::from_center_size(Vec2::new(10.0, -10.0), Vec2::splat(4.0));
        assert_eq!(b.min, Vec2::new(8.0, -12.0));
        assert_eq!(b.max, Vec2::new(12.0, -8.0));
    }

    #[test]
    fn test_distance_inside_is_zero() {
        let b = Bounds2::from_center_size(Vec2::ZERO, Vec2::splat(10.0));
        assert!(b.contains_point(Vec2::new(4.0, -4.0)));
        assert_eq!(b.sqr_distance(Vec2::new(4.0, -4.0)), 0.0);
    }

    #[test]
    fn test_distance_outside() {
        let b = Bounds2::from_center_size(Vec2::ZERO, Vec2::splat(10.0));
        // Straight out along +x
        assert_eq!(b.distance(Vec2::new(8.0, 0.0)), 3.0);
        // Diagonal from the corner
        assert_eq!(b.sqr_distance(Vec2::new(8.0, 9.0)), 9.0 + 16.0);
    }
}
