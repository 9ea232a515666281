//! Streamed terrain chunks and their per-LOD mesh slots

use std::sync::Arc;

use glam::{IVec2, Vec2, Vec3};

use crate::heightmap::HeightMap;
use crate::math::Bounds2;
use crate::mesh::MeshPayload;

/// Chunk position in the terrain grid (x east, y north on the XZ plane)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk whose centre is nearest to a position in mesh units
    pub fn from_position(pos: Vec2, chunk_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_size).round() as i32,
            y: (pos.y / chunk_size).round() as i32,
        }
    }

    /// Centre of this chunk in mesh units
    pub fn centre(&self, chunk_size: f32) -> Vec2 {
        self.as_ivec2().as_vec2() * chunk_size
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev distance in chunks
    pub fn chebyshev(&self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn as_ivec2(&self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }
}

impl From<IVec2> for ChunkCoord {
    fn from(v: IVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Mesh slot for one row of the LOD table
#[derive(Clone, Debug)]
pub struct LodMesh {
    /// Mesher LOD this slot holds
    pub lod: usize,
    mesh: Option<Arc<MeshPayload>>,
    requested: bool,
}

impl LodMesh {
    pub fn new(lod: usize) -> Self {
        Self { lod, mesh: None, requested: false }
    }

    pub fn mesh(&self) -> Option<&Arc<MeshPayload>> {
        self.mesh.as_ref()
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    /// A request was issued and has not failed
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub(crate) fn mark_requested(&mut self) {
        self.requested = true;
    }

    pub(crate) fn clear_request(&mut self) {
        self.requested = false;
    }

    pub(crate) fn store(&mut self, mesh: Arc<MeshPayload>) {
        self.mesh = Some(mesh);
    }
}

/// Where a chunk is in its generation lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// No height map and no outstanding request (after a failed request)
    Created,
    HeightPending,
    /// Height map present, nothing displayed or requested yet
    HeightReady,
    /// Waiting for the mesh of a LOD table row
    MeshPending { lod_index: usize },
    /// Showing the mesh of a LOD table row
    Displayed { lod_index: usize },
}

/// One streamed terrain chunk.
///
/// Chunks are created once and never removed; leaving the view only hides
/// them.
#[derive(Clone, Debug)]
pub struct TerrainChunk {
    pub coord: ChunkCoord,
    /// Centre in mesh units
    pub position: Vec2,
    pub bounds: Bounds2,
    lod_meshes: Vec<LodMesh>,
    height_map: Option<Arc<HeightMap>>,
    height_requested: bool,
    displayed_lod: Option<usize>,
    visible: bool,
    collider_assigned: bool,
}

impl TerrainChunk {
    /// New hidden chunk with one empty mesh slot per LOD
    pub fn new(coord: ChunkCoord, chunk_size: f32, lods: impl IntoIterator<Item = usize>) -> Self {
        let position = coord.centre(chunk_size);
        Self {
            coord,
            position,
            bounds: Bounds2::from_center_size(position, Vec2::splat(chunk_size)),
            lod_meshes: lods.into_iter().map(LodMesh::new).collect(),
            height_map: None,
            height_requested: false,
            displayed_lod: None,
            visible: false,
            collider_assigned: false,
        }
    }

    /// World-space origin of the chunk's mesh
    pub fn world_position(&self, uniform_scale: f32) -> Vec3 {
        Vec3::new(self.position.x, 0.0, self.position.y) * uniform_scale
    }

    pub fn height_map(&self) -> Option<&Arc<HeightMap>> {
        self.height_map.as_ref()
    }

    pub fn is_height_requested(&self) -> bool {
        self.height_requested
    }

    pub fn lod_mesh(&self, index: usize) -> &LodMesh {
        &self.lod_meshes[index]
    }

    pub(crate) fn lod_mesh_mut(&mut self, index: usize) -> &mut LodMesh {
        &mut self.lod_meshes[index]
    }

    pub fn lod_meshes(&self) -> &[LodMesh] {
        &self.lod_meshes
    }

    /// LOD table row currently shown
    pub fn displayed_lod(&self) -> Option<usize> {
        self.displayed_lod
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_collider(&self) -> bool {
        self.collider_assigned
    }

    pub(crate) fn set_height_requested(&mut self, requested: bool) {
        self.height_requested = requested;
    }

    pub(crate) fn set_height_map(&mut self, height_map: Arc<HeightMap>) {
        self.height_map = Some(height_map);
    }

    pub(crate) fn set_displayed_lod(&mut self, index: usize) {
        self.displayed_lod = Some(index);
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_collider_assigned(&mut self) {
        self.collider_assigned = true;
    }

    pub fn state(&self) -> ChunkState {
        if self.height_map.is_none() {
            return if self.height_requested {
                ChunkState::HeightPending
            } else {
                ChunkState::Created
            };
        }
        if let Some(lod_index) = self.displayed_lod {
            return ChunkState::Displayed { lod_index };
        }
        match self.lod_meshes.iter().position(|m| m.requested && !m.has_mesh()) {
            Some(lod_index) => ChunkState::MeshPending { lod_index },
            None => ChunkState::HeightReady,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::HeightField;

    #[test]
    fn test_coord_from_position_rounds() {
        assert_eq!(ChunkCoord::from_position(Vec2::new(22.0, -22.0), 46.0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_position(Vec2::new(24.0, -24.0), 46.0), ChunkCoord::new(1, -1));
        assert_eq!(ChunkCoord::from_position(Vec2::new(92.0, 0.0), 46.0), ChunkCoord::new(2, 0));
    }

    #[test]
    fn test_coord_centre_and_chebyshev() {
        let c = ChunkCoord::new(-2, 3);
        assert_eq!(c.centre(10.0), Vec2::new(-20.0, 30.0));
        assert_eq!(c.chebyshev(ChunkCoord::new(1, 1)), 3);
        assert_eq!(c.offset(2, -3), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from(IVec2::new(4, 5)).as_ivec2(), IVec2::new(4, 5));
    }

    #[test]
    fn test_chunk_bounds_centred_on_coord() {
        let chunk = TerrainChunk::new(ChunkCoord::new(1, 0), 46.0, [0, 1]);
        assert_eq!(chunk.position, Vec2::new(46.0, 0.0));
        assert_eq!(chunk.bounds.min, Vec2::new(23.0, -23.0));
        assert_eq!(chunk.bounds.max, Vec2::new(69.0, 23.0));
        assert_eq!(chunk.world_position(2.0), Vec3::new(92.0, 0.0, 0.0));
        assert_eq!(chunk.lod_meshes().len(), 2);
        assert!(!chunk.is_visible());
    }

    #[test]
    fn test_state_transitions() {
        let mut chunk = TerrainChunk::new(ChunkCoord::new(0, 0), 46.0, [0, 2]);
        assert_eq!(chunk.state(), ChunkState::Created);

        chunk.set_height_requested(true);
        assert_eq!(chunk.state(), ChunkState::HeightPending);

        chunk.set_height_map(Arc::new(HeightMap::new(HeightField::new(5, 5))));
        assert_eq!(chunk.state(), ChunkState::HeightReady);

        chunk.lod_mesh_mut(1).mark_requested();
        assert_eq!(chunk.state(), ChunkState::MeshPending { lod_index: 1 });

        chunk.set_displayed_lod(1);
        assert_eq!(chunk.state(), ChunkState::Displayed { lod_index: 1 });
    }
}
