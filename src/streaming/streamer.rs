//! Viewer-centred chunk streaming
//!
//! Each tick drains finished generation work, then keeps a square window of
//! chunks around the viewer alive: chunks are created on first sight, pick a
//! LOD from their distance, request missing meshes and toggle visibility.
//! Chunks nearly under the viewer are promoted to colliders.
//!
//! All chunk state lives in `StreamerWorld`, which is also the context the
//! generation completions run against, so every mutation happens on the
//! thread calling [`ChunkStreamer::tick`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use glam::{Vec2, Vec3};

use super::chunk::{ChunkCoord, TerrainChunk};
use super::lod::LodTable;
use super::scene::TerrainScene;
use crate::core::Result;
use crate::generation::config::{SharedSettings, TerrainConfig};
use crate::generation::service::{DrainStats, GenerationResult, GenerationService};
use crate::heightmap::{HeightMap, HeightMapSettings, NormalizeMode};
use crate::mesh::{MeshPayload, MeshSettings};

/// Viewer displacement (mesh units) that triggers a window update
pub const VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE: f32 = 25.0;
const SQR_VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE: f32 =
    VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE * VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE;

/// Distance to a chunk's edge (mesh units) within which its collider is set
pub const COLLIDER_GENERATION_DISTANCE_THRESHOLD: f32 = 5.0;

/// Counters for logging and tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamingStats {
    pub ticks: u64,
    pub window_updates: u64,
    pub chunks_created: usize,
    pub visible_chunks: usize,
    pub height_requests: u64,
    pub mesh_requests: u64,
    pub height_maps_received: u64,
    pub meshes_received: u64,
    /// Meshes that arrived for a LOD the chunk no longer wanted
    pub stale_meshes: u64,
    pub colliders_assigned: u64,
    pub failures: u64,
}

struct StreamerWorld<S> {
    service: GenerationService<StreamerWorld<S>>,
    chunks: HashMap<ChunkCoord, TerrainChunk>,
    visible: Vec<ChunkCoord>,
    lods: LodTable,
    collider_lod_index: usize,
    chunk_size: f32,
    uniform_scale: f32,
    viewer: Vec2,
    scene: S,
    stats: StreamingStats,
}

impl<S: TerrainScene + 'static> StreamerWorld<S> {
    fn chunks_in_view_distance(&self) -> i32 {
        (self.lods.max_view_distance() / self.chunk_size).ceil() as i32
    }

    fn update_visible_chunks(&mut self) {
        self.stats.window_updates += 1;

        let mut updated = HashSet::new();
        let previously_visible = self.visible.clone();
        for &coord in previously_visible.iter().rev() {
            updated.insert(coord);
            self.refresh_chunk(coord);
        }

        let current = ChunkCoord::from_position(self.viewer, self.chunk_size);
        let radius = self.chunks_in_view_distance();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let coord = current.offset(dx, dy);
                if updated.contains(&coord) {
                    continue;
                }
                if self.chunks.contains_key(&coord) {
                    self.refresh_chunk(coord);
                } else {
                    self.create_chunk(coord);
                }
            }
        }

        log::debug!(
            "Window around chunk {} updated: {} cached, {} visible",
            current,
            self.chunks.len(),
            self.visible.len()
        );
    }

    fn create_chunk(&mut self, coord: ChunkCoord) {
        let chunk = TerrainChunk::new(coord, self.chunk_size, self.lods.levels().iter().map(|l| l.lod));
        self.scene
            .chunk_created(coord, chunk.world_position(self.uniform_scale), self.uniform_scale);
        self.chunks.insert(coord, chunk);
        self.stats.chunks_created += 1;
        self.request_height_map(coord);
    }

    fn request_height_map(&mut self, coord: ChunkCoord) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        chunk.set_height_requested(true);
        self.stats.height_requests += 1;
        self.service
            .request_height_map(chunk.position, move |world: &mut StreamerWorld<S>, result| {
                world.on_height_map(coord, result)
            });
    }

    fn request_mesh(&mut self, coord: ChunkCoord, lod_index: usize) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        let Some(height_map) = chunk.height_map().cloned() else {
            return;
        };
        let slot = chunk.lod_mesh_mut(lod_index);
        if slot.is_requested() || slot.has_mesh() {
            return;
        }
        slot.mark_requested();
        let lod = slot.lod;
        self.stats.mesh_requests += 1;
        log::trace!("Requesting LOD {} mesh for chunk {}", lod, coord);
        self.service
            .request_mesh(height_map, lod, move |world: &mut StreamerWorld<S>, result| {
                world.on_mesh(coord, lod_index, result)
            });
    }

    fn on_height_map(&mut self, coord: ChunkCoord, result: GenerationResult<Arc<HeightMap>>) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        match result {
            Ok(height_map) => {
                chunk.set_height_map(height_map);
                self.stats.height_maps_received += 1;
                self.refresh_chunk(coord);
                self.update_collider(coord);
            }
            Err(e) => {
                log::warn!("Height map for chunk {} failed: {}", coord, e);
                chunk.set_height_requested(false);
                self.stats.failures += 1;
            }
        }
    }

    fn on_mesh(&mut self, coord: ChunkCoord, lod_index: usize, result: GenerationResult<Arc<MeshPayload>>) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        match result {
            Ok(mesh) => {
                chunk.lod_mesh_mut(lod_index).store(mesh);
                self.stats.meshes_received += 1;
                self.refresh_chunk(coord);

                let displayed = self.chunks.get(&coord).and_then(|c| c.displayed_lod());
                if displayed != Some(lod_index) && lod_index != self.collider_lod_index {
                    self.stats.stale_meshes += 1;
                    log::debug!("Chunk {} kept LOD index {} mesh for later", coord, lod_index);
                }
                if lod_index == self.collider_lod_index {
                    self.update_collider(coord);
                }
            }
            Err(e) => {
                log::warn!("Mesh for chunk {} at LOD index {} failed: {}", coord, lod_index, e);
                chunk.lod_mesh_mut(lod_index).clear_request();
                self.stats.failures += 1;
            }
        }
    }

    /// Re-select LOD and visibility for one chunk.
    fn refresh_chunk(&mut self, coord: ChunkCoord) {
        let max_view_distance = self.lods.max_view_distance();
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };

        if chunk.height_map().is_none() {
            if !chunk.is_height_requested() {
                self.request_height_map(coord);
            }
            return;
        }

        let distance = chunk.bounds.distance(self.viewer);
        let was_visible = chunk.is_visible();
        let visible = distance <= max_view_distance;
        let mut missing_lod = None;

        if visible {
            let lod_index = self.lods.select(distance);
            if chunk.displayed_lod() != Some(lod_index) {
                let slot = chunk.lod_mesh(lod_index);
                if let Some(mesh) = slot.mesh().cloned() {
                    chunk.set_displayed_lod(lod_index);
                    self.scene.set_mesh(coord, &mesh);
                } else if !slot.is_requested() {
                    missing_lod = Some(lod_index);
                }
            }
        }

        if was_visible != visible {
            chunk.set_visible(visible);
            if visible {
                self.visible.push(coord);
            } else {
                self.visible.retain(|c| *c != coord);
            }
            self.scene.set_visible(coord, visible);
        }

        if let Some(lod_index) = missing_lod {
            self.request_mesh(coord, lod_index);
        }
    }

    /// Request and, once close enough, assign the collision mesh.
    fn update_collider(&mut self, coord: ChunkCoord) {
        let index = self.collider_lod_index;
        let sqr_collider_distance = self.lods.level(index).sqr_visible_distance();
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        if chunk.has_collider() {
            return;
        }

        let sqr_distance = chunk.bounds.sqr_distance(self.viewer);
        let slot = chunk.lod_mesh(index);
        let request = sqr_distance < sqr_collider_distance
            && !slot.is_requested()
            && !slot.has_mesh()
            && chunk.height_map().is_some();

        if sqr_distance <= COLLIDER_GENERATION_DISTANCE_THRESHOLD * COLLIDER_GENERATION_DISTANCE_THRESHOLD {
            if let Some(mesh) = slot.mesh().cloned() {
                chunk.set_collider_assigned();
                self.scene.set_collider(coord, &mesh);
                self.stats.colliders_assigned += 1;
                log::debug!("Collider assigned to chunk {}", coord);
            }
        }

        if request {
            self.request_mesh(coord, index);
        }
    }
}

/// Streams terrain chunks around a moving viewer into a [`TerrainScene`].
pub struct ChunkStreamer<S> {
    world: StreamerWorld<S>,
    last_viewer: Option<Vec2>,
    last_update_viewer: Option<Vec2>,
}

impl<S: TerrainScene + 'static> ChunkStreamer<S> {
    /// Build a streamer and its worker pool from a config.
    ///
    /// Local normalization cannot tile, so it is replaced by global.
    pub fn new(config: &TerrainConfig, scene: S) -> Result<Self> {
        let mut height = config.height_map.clone();
        if height.noise.normalize_mode != NormalizeMode::Global {
            log::warn!("Streaming requires global normalization; overriding local mode");
            height.noise.normalize_mode = NormalizeMode::Global;
        }
        Self::with_settings(
            config,
            SharedSettings::new(height),
            SharedSettings::new(config.mesh.clone()),
            scene,
        )
    }

    /// Build a streamer sharing existing settings cells.
    ///
    /// Chunk size and scale are read once here; later edits only affect
    /// height and mesh generation of new requests.
    pub fn with_settings(
        config: &TerrainConfig,
        height_settings: SharedSettings<HeightMapSettings>,
        mesh_settings: SharedSettings<MeshSettings>,
        scene: S,
    ) -> Result<Self> {
        let config = config.clone().validated();
        let mesh = mesh_settings.get();
        let service = GenerationService::new(&config.generation, height_settings, mesh_settings.clone())?;

        log::info!(
            "Chunk streamer ready: chunk size {}, view distance {}, {} LOD levels, collider LOD index {}",
            mesh.mesh_world_size(),
            config.lods.max_view_distance(),
            config.lods.len(),
            config.collider_lod_index
        );

        Ok(Self {
            world: StreamerWorld {
                service,
                chunks: HashMap::new(),
                visible: Vec::new(),
                lods: config.lods,
                collider_lod_index: config.collider_lod_index,
                chunk_size: mesh.mesh_world_size(),
                uniform_scale: mesh.uniform_scale,
                viewer: Vec2::ZERO,
                scene,
                stats: StreamingStats::default(),
            },
            last_viewer: None,
            last_update_viewer: None,
        })
    }

    /// Advance one frame with the viewer at `viewer_world` (world units).
    ///
    /// Runs finished generation callbacks, then updates colliders and, past
    /// the move threshold, the chunk window. Never waits on workers.
    pub fn tick(&mut self, viewer_world: Vec3) -> DrainStats {
        let service = self.world.service.clone();
        let drained = service.process_completed(&mut self.world);
        if drained.total() > 0 {
            log::debug!(
                "Delivered {} height maps, {} meshes ({} failed)",
                drained.height_maps,
                drained.meshes,
                drained.failures
            );
        }
        self.world.stats.ticks += 1;

        let viewer = Vec2::new(viewer_world.x, viewer_world.z) / self.world.uniform_scale;
        self.world.viewer = viewer;

        if self.last_viewer != Some(viewer) {
            for coord in self.world.visible.clone() {
                self.world.update_collider(coord);
            }
        }
        self.last_viewer = Some(viewer);

        let moved_far = self
            .last_update_viewer
            .is_none_or(|prev| prev.distance_squared(viewer) > SQR_VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE);
        if moved_far {
            self.world.update_visible_chunks();
            self.last_update_viewer = Some(viewer);
        }

        self.world.stats.visible_chunks = self.world.visible.len();
        drained
    }

    /// Viewer position in mesh units as of the last tick
    pub fn viewer(&self) -> Vec2 {
        self.world.viewer
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&TerrainChunk> {
        self.world.chunks.get(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.world.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.world.chunks.len()
    }

    /// Visible chunks in the order they became visible
    pub fn visible_chunks(&self) -> &[ChunkCoord] {
        &self.world.visible
    }

    pub fn lods(&self) -> &LodTable {
        &self.world.lods
    }

    pub fn collider_lod_index(&self) -> usize {
        self.world.collider_lod_index
    }

    /// Chunk side in mesh units
    pub fn chunk_size(&self) -> f32 {
        self.world.chunk_size
    }

    pub fn stats(&self) -> StreamingStats {
        self.world.stats
    }

    pub fn scene(&self) -> &S {
        &self.world.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.world.scene
    }

    /// Height settings used by new requests
    pub fn height_settings(&self) -> &SharedSettings<HeightMapSettings> {
        self.world.service.height_settings()
    }

    /// True when no generation work is pending, running or undelivered
    pub fn is_settled(&self) -> bool {
        self.world.service.is_idle() && self.world.service.queued_count() == 0
    }

    /// Block until all issued generation work has finished. For tools and
    /// tests; results are still delivered by the next `tick`.
    pub fn wait_for_generation(&self, timeout: Duration) -> bool {
        self.world.service.wait_until_idle(timeout)
    }
}
