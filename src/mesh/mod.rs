//! Terrain mesh construction

pub mod builder;
pub mod payload;

pub use builder::{generate_terrain_mesh, simplification_increment, vertices_per_line};
pub use payload::{MeshPayload, VertexNormals};

use serde::{Deserialize, Serialize};

/// Number of LOD levels the mesher supports (LOD 0 to 4).
pub const NUM_SUPPORTED_LODS: usize = 5;

/// Chunk sizes whose bordered side fits every supported LOD stride.
pub const SUPPORTED_CHUNK_SIZES: [usize; 9] = [48, 72, 96, 120, 144, 168, 192, 216, 240];

/// Smaller set for flat shading, where every triangle owns three vertices.
pub const SUPPORTED_FLAT_SHADED_CHUNK_SIZES: [usize; 3] = [48, 72, 96];

/// Mesh resolution and shading settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// World units per mesh unit.
    pub uniform_scale: f32,
    pub use_flat_shading: bool,
    pub chunk_size_index: usize,
    pub flat_shaded_chunk_size_index: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            uniform_scale: 2.5,
            use_flat_shading: false,
            chunk_size_index: SUPPORTED_CHUNK_SIZES.len() - 1,
            flat_shaded_chunk_size_index: SUPPORTED_FLAT_SHADED_CHUNK_SIZES.len() - 1,
        }
    }
}

impl MeshSettings {
    pub fn validate(&mut self) {
        self.chunk_size_index = self.chunk_size_index.min(SUPPORTED_CHUNK_SIZES.len() - 1);
        self.flat_shaded_chunk_size_index = self
            .flat_shaded_chunk_size_index
            .min(SUPPORTED_FLAT_SHADED_CHUNK_SIZES.len() - 1);
        if self.uniform_scale.is_nan() || self.uniform_scale <= 0.0 {
            self.uniform_scale = 1.0;
        }
    }

    /// Active supported chunk size for the current shading mode.
    pub fn chunk_size(&self) -> usize {
        if self.use_flat_shading {
            SUPPORTED_FLAT_SHADED_CHUNK_SIZES[self.flat_shaded_chunk_size_index
                .min(SUPPORTED_FLAT_SHADED_CHUNK_SIZES.len() - 1)]
        } else {
            SUPPORTED_CHUNK_SIZES[self.chunk_size_index.min(SUPPORTED_CHUNK_SIZES.len() - 1)]
        }
    }

    /// Vertices per line of a LOD 0 mesh.
    pub fn num_verts_per_line(&self) -> usize {
        self.chunk_size() - 1
    }

    /// Side of the height field requested per chunk, border ring included.
    pub fn bordered_size(&self) -> usize {
        self.num_verts_per_line() + 2
    }

    /// Side of one chunk in mesh units.
    pub fn mesh_world_size(&self) -> f32 {
        (self.num_verts_per_line() - 1) as f32
    }
}
