//! Level of Detail (LOD) table for distance-based mesh simplification
//!
//! Each table entry pairs a mesher LOD with the distance up to which it is
//! used. Entry 0 is the most detailed and covers the viewer's surroundings;
//! the last entry's distance is also the maximum view distance.

use serde::{Deserialize, Serialize};

use crate::mesh::NUM_SUPPORTED_LODS;

/// One row of the LOD table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    /// Mesher LOD (0 = full detail).
    pub lod: usize,
    /// Distance from the viewer to the chunk edge up to which this row applies.
    pub visible_distance: f32,
}

impl LodInfo {
    pub fn new(lod: usize, visible_distance: f32) -> Self {
        Self { lod, visible_distance }
    }

    pub fn sqr_visible_distance(&self) -> f32 {
        self.visible_distance * self.visible_distance
    }
}

/// Ordered LOD rows with non-decreasing distances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<LodInfo>", into = "Vec<LodInfo>")]
pub struct LodTable {
    levels: Vec<LodInfo>,
}

impl LodTable {
    /// Build a table. LODs are clamped to the supported range and rows are
    /// ordered by distance; an empty list falls back to the default table.
    ///
    /// Each mesher LOD appears once, since chunks keep one mesh slot per row.
    /// When rows share a LOD, the farthest one is kept.
    pub fn new(mut levels: Vec<LodInfo>) -> Self {
        if levels.is_empty() {
            return Self::default();
        }
        for level in &mut levels {
            level.lod = level.lod.min(NUM_SUPPORTED_LODS - 1);
            if level.visible_distance.is_nan() || level.visible_distance < 0.0 {
                level.visible_distance = 0.0;
            }
        }
        levels.sort_by(|a, b| {
            a.visible_distance
                .partial_cmp(&b.visible_distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let rows = levels.len();
        let mut seen = [false; NUM_SUPPORTED_LODS];
        let mut unique: Vec<LodInfo> = levels
            .into_iter()
            .rev()
            .filter(|level| !std::mem::replace(&mut seen[level.lod], true))
            .collect();
        if unique.len() < rows {
            log::warn!("LOD table: {} rows shared a mesher LOD and were merged", rows - unique.len());
        }
        unique.reverse();
        Self { levels: unique }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> &LodInfo {
        &self.levels[index]
    }

    pub fn levels(&self) -> &[LodInfo] {
        &self.levels
    }

    /// Distance beyond which chunks are hidden.
    pub fn max_view_distance(&self) -> f32 {
        self.levels.last().map_or(0.0, |l| l.visible_distance)
    }

    /// Table index for a viewer distance.
    ///
    /// Scans from the most detailed row and stops at the first threshold the
    /// distance does not exceed. Distances past the last threshold keep the
    /// last row; visibility is decided separately.
    pub fn select(&self, distance: f32) -> usize {
        let mut index = 0;
        for i in 0..self.levels.len().saturating_sub(1) {
            if distance > self.levels[i].visible_distance {
                index = i + 1;
            } else {
                break;
            }
        }
        index
    }
}

impl Default for LodTable {
    fn default() -> Self {
        Self {
            levels: vec![
                LodInfo::new(0, 200.0),
                LodInfo::new(1, 300.0),
                LodInfo::new(2, 400.0),
                LodInfo::new(4, 600.0),
            ],
        }
    }
}

impl From<Vec<LodInfo>> for LodTable {
    fn from(levels: Vec<LodInfo>) -> Self {
        Self::new(levels)
    }
}

impl From<LodTable> for Vec<LodInfo> {
    fn from(table: LodTable) -> Self {
        table.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_boundaries() {
        let table = LodTable::default();
        assert_eq!(table.select(0.0), 0);
        assert_eq!(table.select(200.0), 0);
        assert_eq!(table.select(200.1), 1);
        assert_eq!(table.select(300.0), 1);
        assert_eq!(table.select(350.0), 2);
        assert_eq!(table.select(401.0), 3);
        assert_eq!(table.select(10_000.0), 3);
    }

    #[test]
    fn test_select_is_monotonic_step_function() {
        let table = LodTable::default();
        let mut prev = 0;
        for i in 0..2000 {
            let distance = i as f32 * 0.5;
            let index = table.select(distance);
            assert!(index >= prev, "LOD regressed at distance {}", distance);
            if index > 0 {
                assert!(distance > table.level(index - 1).visible_distance);
            }
            prev = index;
        }
    }

    #[test]
    fn test_max_view_distance() {
        assert_eq!(LodTable::default().max_view_distance(), 600.0);
    }

    #[test]
    fn test_new_clamps_and_sorts() {
        let table = LodTable::new(vec![
            LodInfo::new(9, 500.0),
            LodInfo::new(0, 100.0),
            LodInfo::new(2, -5.0),
        ]);
        assert_eq!(table.level(0), &LodInfo::new(2, 0.0));
        assert_eq!(table.level(1), &LodInfo::new(0, 100.0));
        assert_eq!(table.level(2).lod, NUM_SUPPORTED_LODS - 1);
        assert_eq!(table.max_view_distance(), 500.0);
    }

    #[test]
    fn test_duplicate_lods_keep_farthest_row() {
        let table = LodTable::new(vec![
            LodInfo::new(0, 50.0),
            LodInfo::new(0, 100.0),
            LodInfo::new(7, 150.0),
            LodInfo::new(4, 200.0),
        ]);
        assert_eq!(table.levels(), &[LodInfo::new(0, 100.0), LodInfo::new(4, 200.0)]);
        assert_eq!(table.select(75.0), 0);
        assert_eq!(table.select(175.0), 1);
        assert_eq!(table.max_view_distance(), 200.0);
    }

    #[test]
    fn test_empty_falls_back_to_default() {
        assert_eq!(LodTable::new(Vec::new()), LodTable::default());
    }

    #[test]
    fn test_single_level() {
        let table = LodTable::new(vec![LodInfo::new(1, 50.0)]);
        assert_eq!(table.select(0.0), 0);
        assert_eq!(table.select(1000.0), 0);
    }

    #[test]
    fn test_serde_as_list() {
        let json = serde_json::to_string(&LodTable::default()).unwrap();
        assert!(json.starts_with('['));
        let back: LodTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LodTable::default());
    }

    #[test]
    fn test_sqr_visible_distance() {
        assert_eq!(LodInfo::new(0, 5.0).sqr_visible_distance(), 25.0);
    }
}
