//! Presentation sink for streamed chunks
//!
//! The streamer never touches a renderer or physics world directly. It
//! reports chunk creation, mesh swaps, visibility and collider assignment to
//! a [`TerrainScene`], always from the thread that calls `tick`.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;

use super::chunk::ChunkCoord;
use crate::mesh::MeshPayload;

/// Receiver of chunk presentation changes.
pub trait TerrainScene {
    /// A chunk entered the cache. `origin` is its world-space position.
    fn chunk_created(&mut self, _coord: ChunkCoord, _origin: Vec3, _uniform_scale: f32) {}

    /// Display `mesh` for the chunk, replacing the previous one.
    fn set_mesh(&mut self, coord: ChunkCoord, mesh: &Arc<MeshPayload>);

    fn set_visible(&mut self, coord: ChunkCoord, visible: bool);

    /// Assign the chunk's collision mesh. Called at most once per chunk.
    fn set_collider(&mut self, coord: ChunkCoord, mesh: &Arc<MeshPayload>);
}

/// One recorded scene call.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneEvent {
    Created(ChunkCoord),
    Mesh { coord: ChunkCoord, lod: usize },
    Visible { coord: ChunkCoord, visible: bool },
    Collider { coord: ChunkCoord, lod: usize },
}

/// Scene that keeps a log of every call plus the current per-chunk state.
///
/// Used by the headless streaming tool and tests.
#[derive(Debug, Default)]
pub struct RecordingScene {
    pub events: Vec<SceneEvent>,
    meshes: HashMap<ChunkCoord, Arc<MeshPayload>>,
    visible: HashMap<ChunkCoord, bool>,
}

impl RecordingScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh currently shown for a chunk
    pub fn mesh(&self, coord: ChunkCoord) -> Option<&Arc<MeshPayload>> {
        self.meshes.get(&coord)
    }

    pub fn is_visible(&self, coord: ChunkCoord) -> bool {
        self.visible.get(&coord).copied().unwrap_or(false)
    }

    pub fn visible_count(&self) -> usize {
        self.visible.values().filter(|v| **v).count()
    }

    /// Number of collider assignments for a chunk
    pub fn collider_count(&self, coord: ChunkCoord) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SceneEvent::Collider { coord: c, .. } if *c == coord))
            .count()
    }

    /// Triangles across all visible chunks
    pub fn visible_triangles(&self) -> usize {
        self.meshes
            .iter()
            .filter(|(coord, _)| self.is_visible(**coord))
            .map(|(_, mesh)| mesh.triangle_count())
            .sum()
    }
}

impl TerrainScene for RecordingScene {
    fn chunk_created(&mut self, coord: ChunkCoord, _origin: Vec3, _uniform_scale: f32) {
        self.events.push(SceneEvent::Created(coord));
    }

    fn set_mesh(&mut self, coord: ChunkCoord, mesh: &Arc<MeshPayload>) {
        self.events.push(SceneEvent::Mesh { coord, lod: mesh.lod });
        self.meshes.insert(coord, Arc::clone(mesh));
    }

    fn set_visible(&mut self, coord: ChunkCoord, visible: bool) {
        self.events.push(SceneEvent::Visible { coord, visible });
        self.visible.insert(coord, visible);
    }

    fn set_collider(&mut self, coord: ChunkCoord, mesh: &Arc<MeshPayload>) {
        self.events.push(SceneEvent::Collider { coord, lod: mesh.lod });
    }
}
