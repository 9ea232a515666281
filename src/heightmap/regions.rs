//! Height-banded terrain categories and colour maps

use serde::{Deserialize, Serialize};

use super::HeightField;

/// One terrain category, active from `height` up to the next category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainType {
    pub name: String,
    /// Lower bound of this band in normalized height.
    pub height: f32,
    /// RGBA colour.
    pub colour: [u8; 4],
}

impl TerrainType {
    pub fn new(name: impl Into<String>, height: f32, colour: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            height,
            colour,
        }
    }
}

/// Ordered table of terrain categories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionTable {
    regions: Vec<TerrainType>,
}

impl RegionTable {
    /// Create a table from unsorted regions. Regions are sorted by height.
    pub fn new(mut regions: Vec<TerrainType>) -> Self {
        regions.sort_by(|a, b| a.height.partial_cmp(&b.height).unwrap_or(std::cmp::Ordering::Equal));
        Self { regions }
    }

    pub fn regions(&self) -> &[TerrainType] {
        &self.regions
    }

    /// Highest region whose threshold is at or below `height`.
    ///
    /// Heights below every threshold fall into the lowest region.
    pub fn region_at(&self, height: f32) -> Option<&TerrainType> {
        let mut current = self.regions.first()?;
        for region in &self.regions {
            if height >= region.height {
                current = region;
            } else {
                break;
            }
        }
        Some(current)
    }

    /// Colour for a height; black when the table is empty.
    pub fn colour_at(&self, height: f32) -> [u8; 4] {
        self.region_at(height).map_or([0, 0, 0, 255], |r| r.colour)
    }

    /// Row-major colour map for a whole field.
    pub fn colour_map(&self, field: &HeightField) -> Vec<[u8; 4]> {
        field.values().iter().map(|&h| self.colour_at(h)).collect()
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new(vec![
            TerrainType::new("Deep water", 0.0, [50, 99, 195, 255]),
            TerrainType::new("Shallow water", 0.3, [54, 103, 199, 255]),
            TerrainType::new("Sand", 0.4, [210, 208, 125, 255]),
            TerrainType::new("Grass", 0.45, [86, 152, 23, 255]),
            TerrainType::new("Forest", 0.55, [62, 107, 18, 255]),
            TerrainType::new("Rock", 0.6, [90, 69, 60, 255]),
            TerrainType::new("High rock", 0.7, [75, 60, 53, 255]),
            TerrainType::new("Snow", 0.9, [255, 255, 255, 255]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_lookup() {
        let table = RegionTable::default();
        assert_eq!(table.region_at(0.1).map(|r| r.name.as_str()), Some("Deep water"));
        assert_eq!(table.region_at(0.3).map(|r| r.name.as_str()), Some("Shallow water"));
        assert_eq!(table.region_at(0.5).map(|r| r.name.as_str()), Some("Grass"));
        assert_eq!(table.region_at(1.4).map(|r| r.name.as_str()), Some("Snow"));
    }

    #[test]
    fn test_below_lowest_uses_first_region() {
        let table = RegionTable::new(vec![
            TerrainType::new("High", 0.8, [1, 1, 1, 255]),
            TerrainType::new("Low", 0.2, [2, 2, 2, 255]),
        ]);
        assert_eq!(table.colour_at(0.0), [2, 2, 2, 255]);
        assert_eq!(table.colour_at(0.9), [1, 1, 1, 255]);
    }

    #[test]
    fn test_empty_table() {
        let table = RegionTable::new(Vec::new());
        assert!(table.region_at(0.5).is_none());
        assert_eq!(table.colour_at(0.5), [0, 0, 0, 255]);
    }

    #[test]
    fn test_colour_map_shape() {
        let field = HeightField::from_fn(4, 3, |x, _| x as f32 / 3.0);
        let table = RegionTable::default();
        let colours = table.colour_map(&field);
        assert_eq!(colours.len(), 12);
        assert_eq!(colours[0], table.colour_at(0.0));
        assert_eq!(colours[3], table.colour_at(1.0));
    }
}
