//! Finished terrain meshes handed to the scene

use glam::{Vec2, Vec3};

/// How the consumer should obtain vertex normals.
#[derive(Clone, Debug, PartialEq)]
pub enum VertexNormals {
    /// Smooth normals computed at build time, one per vertex.
    Baked(Vec<Vec3>),
    /// Every triangle owns its vertices; compute one normal per face at
    /// upload time (see [`MeshPayload::flat_normals`]).
    RecalculateFlat,
}

/// Immutable triangle mesh for one chunk at one LOD.
///
/// Only interior vertices are present; every index refers to `positions`.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshPayload {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub normals: VertexNormals,
    /// LOD this mesh was built for.
    pub lod: usize,
}

impl MeshPayload {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_flat_shaded(&self) -> bool {
        matches!(self.normals, VertexNormals::RecalculateFlat)
    }

    /// Per-vertex normals for a flat-shaded mesh: each triangle's face normal
    /// copied to its three vertices. Returns the baked normals unchanged for
    /// smooth meshes.
    pub fn flat_normals(&self) -> Vec<Vec3> {
        if let VertexNormals::Baked(normals) = &self.normals {
            return normals.clone();
        }
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let n = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a])
                .normalize_or_zero();
            normals[a] = n;
            normals[b] = n;
            normals[c] = n;
        }
        normals
    }

    /// Raw vertex position bytes for buffer upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Raw UV bytes for buffer upload.
    pub fn uv_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }

    /// Raw index bytes for buffer upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Lowest and highest vertex height.
    pub fn height_range(&self) -> (f32, f32) {
        self.positions
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(normals: VertexNormals) -> MeshPayload {
        MeshPayload {
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(0.0, 0.0, -1.0),
            ],
            uvs: vec![Vec2::ZERO, Vec2::ONE, Vec2::Y],
            indices: vec![0, 1, 2],
            normals,
            lod: 0,
        }
    }

    #[test]
    fn test_flat_normals_point_up() {
        let mesh = quad(VertexNormals::RecalculateFlat);
        assert!(mesh.is_flat_shaded());
        for n in mesh.flat_normals() {
            assert!((n - Vec3::Y).length() < 1e-6);
        }
    }

    #[test]
    fn test_byte_views() {
        let mesh = quad(VertexNormals::Baked(vec![Vec3::Y; 3]));
        assert_eq!(mesh.position_bytes().len(), 3 * 12);
        assert_eq!(mesh.uv_bytes().len(), 3 * 8);
        assert_eq!(mesh.index_bytes().len(), 3 * 4);
        assert_eq!(mesh.triangle_count(), 1);
    }
}
