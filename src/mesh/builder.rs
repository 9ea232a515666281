//! Height field triangulation with LOD simplification.
//!
//! The input field carries a one-sample border ring around the chunk. Border
//! samples become vertices with negative indices: they take part in normal
//! accumulation, so edge normals agree with the neighbouring chunk, but they
//! are never emitted.

use glam::{Vec2, Vec3};

use super::payload::{MeshPayload, VertexNormals};
use crate::heightmap::{HeightCurve, HeightField};

/// Lattice step for a LOD: every sample at LOD 0, then every `2 * lod`th.
pub fn simplification_increment(lod: usize) -> usize {
    if lod == 0 { 1 } else { lod * 2 }
}

/// Interior vertices per mesh edge for a bordered field side and LOD.
pub fn vertices_per_line(bordered_size: usize, lod: usize) -> usize {
    let stride = simplification_increment(lod);
    let mesh_size = bordered_size - 2 * stride;
    (mesh_size - 1) / stride + 1
}

/// In-progress mesh with separate interior and border vertex spaces.
struct MeshData {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<[u32; 3]>,
    border_vertices: Vec<Vec3>,
    border_triangles: Vec<[i32; 3]>,
}

impl MeshData {
    fn new(vertices_per_line: usize) -> Self {
        let interior = vertices_per_line * vertices_per_line;
        let quads = (vertices_per_line - 1) * (vertices_per_line - 1);
        Self {
            vertices: vec![Vec3::ZERO; interior],
            uvs: vec![Vec2::ZERO; interior],
            triangles: Vec::with_capacity(quads * 2),
            border_vertices: vec![Vec3::ZERO; 4 * vertices_per_line + 4],
            border_triangles: Vec::with_capacity(24 * vertices_per_line),
        }
    }

    fn add_vertex(&mut self, position: Vec3, uv: Vec2, index: i32) {
        if index < 0 {
            self.border_vertices[(-index - 1) as usize] = position;
        } else {
            self.vertices[index as usize] = position;
            self.uvs[index as usize] = uv;
        }
    }

    fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        if a < 0 || b < 0 || c < 0 {
            self.border_triangles.push([a, b, c]);
        } else {
            self.triangles.push([a as u32, b as u32, c as u32]);
        }
    }

    fn point(&self, index: i32) -> Vec3 {
        if index < 0 {
            self.border_vertices[(-index - 1) as usize]
        } else {
            self.vertices[index as usize]
        }
    }

    fn surface_normal(&self, a: i32, b: i32, c: i32) -> Vec3 {
        let pa = self.point(a);
        (self.point(b) - pa).cross(self.point(c) - pa).normalize_or_zero()
    }

    fn calculate_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];

        for &[a, b, c] in &self.triangles {
            let n = self.surface_normal(a as i32, b as i32, c as i32);
            normals[a as usize] += n;
            normals[b as usize] += n;
            normals[c as usize] += n;
        }

        for &tri in &self.border_triangles {
            let n = self.surface_normal(tri[0], tri[1], tri[2]);
            for index in tri {
                if index >= 0 {
                    normals[index as usize] += n;
                }
            }
        }

        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        normals
    }

    fn finish(self, flat_shading: bool, lod: usize) -> MeshPayload {
        if flat_shading {
            let count = self.triangles.len() * 3;
            let mut positions = Vec::with_capacity(count);
            let mut uvs = Vec::with_capacity(count);
            for &i in self.triangles.iter().flatten() {
                positions.push(self.vertices[i as usize]);
                uvs.push(self.uvs[i as usize]);
            }
            MeshPayload {
                positions,
                uvs,
                indices: (0..count as u32).collect(),
                normals: VertexNormals::RecalculateFlat,
                lod,
            }
        } else {
            let normals = self.calculate_normals();
            MeshPayload {
                indices: self.triangles.iter().flatten().copied().collect(),
                positions: self.vertices,
                uvs: self.uvs,
                normals: VertexNormals::Baked(normals),
                lod,
            }
        }
    }
}

/// Triangulate a bordered, square height field.
///
/// Heights are remapped through `curve` and scaled by `height_multiplier`.
/// The mesh is centred on the origin in XZ and spans `side - 3` units at
/// every LOD; +x follows the field's x axis and +z runs against its y axis.
///
/// # Panics
/// If the field is not square, or its side does not fit the LOD's lattice
/// (`(side - 1) % stride != 0` or fewer than two interior samples per line).
pub fn generate_terrain_mesh(
    height_map: &HeightField,
    height_multiplier: f32,
    curve: &HeightCurve,
    lod: usize,
    flat_shading: bool,
) -> MeshPayload {
    let stride = simplification_increment(lod);
    let bordered_size = height_map.width();
    assert_eq!(bordered_size, height_map.height(), "height field must be square");
    assert!(
        bordered_size > 3 * stride && (bordered_size - 1) % stride == 0,
        "bordered size {} does not fit LOD {} (stride {})",
        bordered_size,
        lod,
        stride
    );

    let mesh_size = bordered_size - 2 * stride;
    let mesh_size_unsimplified = bordered_size - 2;
    let extent = (mesh_size_unsimplified - 1) as f32;
    let top_left_x = -extent / 2.0;
    let top_left_z = extent / 2.0;
    let span = (mesh_size - 1) as f32;
    let last = bordered_size - 1;

    let mut data = MeshData::new(vertices_per_line(bordered_size, lod));

    let mut index_map = vec![0i32; bordered_size * bordered_size];
    let mut mesh_index = 0i32;
    let mut border_index = -1i32;
    for y in (0..bordered_size).step_by(stride) {
        for x in (0..bordered_size).step_by(stride) {
            let slot = &mut index_map[x + y * bordered_size];
            if x == 0 || y == 0 || x == last || y == last {
                *slot = border_index;
                border_index -= 1;
            } else {
                *slot = mesh_index;
                mesh_index += 1;
            }
        }
    }

    for y in (0..bordered_size).step_by(stride) {
        for x in (0..bordered_size).step_by(stride) {
            let index = index_map[x + y * bordered_size];
            let percent = Vec2::new(
                (x as f32 - stride as f32) / span,
                (y as f32 - stride as f32) / span,
            );
            let height = curve.evaluate(height_map.get(x, y)) * height_multiplier;
            let position = Vec3::new(
                top_left_x + percent.x * extent,
                height,
                top_left_z - percent.y * extent,
            );
            data.add_vertex(position, percent, index);

            if x < last && y < last {
                let a = index_map[x + y * bordered_size];
                let b = index_map[x + stride + y * bordered_size];
                let c = index_map[x + (y + stride) * bordered_size];
                let d = index_map[x + stride + (y + stride) * bordered_size];
                data.add_triangle(a, d, c);
                data.add_triangle(d, a, b);
            }
        }
    }

    data.finish(flat_shading, lod)
}
