//! Chunk streaming around a moving viewer with distance-based LOD

pub mod chunk;
pub mod lod;
pub mod scene;
pub mod streamer;

pub use chunk::{ChunkCoord, ChunkState, LodMesh, TerrainChunk};
pub use lod::{LodInfo, LodTable};
pub use scene::{RecordingScene, SceneEvent, TerrainScene};
pub use streamer::{
    COLLIDER_GENERATION_DISTANCE_THRESHOLD, ChunkStreamer, StreamingStats,
    VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE,
};
