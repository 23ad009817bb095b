//! Triangle mesh data owned by geometry components.
//!
//! Meshes are stored in local (object) space. The raytracer tessellates
//! them into world-space triangles when it snapshots a scene.

use sable_math::{Aabb, Vec2, Vec3};

/// Indexed triangle mesh with optional per-vertex normals and UVs.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,

    /// Per-vertex normals, when authored
    pub normals: Option<Vec<Vec3>>,

    /// Per-vertex UV coordinates, when authored
    pub uvs: Option<Vec<Vec2>>,

    /// Every 3 indices form a counter-clockwise triangle
    pub indices: Vec<u32>,

    /// Local-space bounds
    pub bounds: Aabb,
}

/// One triangle pulled out of a `Mesh`, attributes resolved per corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshTriangle {
    pub positions: [Vec3; 3],
    /// `None` when the mesh carries no usable per-vertex normals.
    pub normals: Option<[Vec3; 3]>,
    pub uvs: [Vec2; 3],
}

impl Mesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_point_cloud(&positions);
        Self {
            positions,
            normals: None,
            uvs: None,
            indices,
            bounds,
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Axis-aligned quad in the local XY plane facing +Z, centred on the
    /// origin, with UVs spanning [0, 1].
    pub fn quad(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Mesh::new(
            vec![
                Vec3::new(-hw, -hh, 0.0),
                Vec3::new(hw, -hh, 0.0),
                Vec3::new(hw, hh, 0.0),
                Vec3::new(-hw, hh, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
        .with_normals(vec![Vec3::Z; 4])
        .with_uvs(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ])
    }

    /// Replace normals with smooth vertex normals averaged from the
    /// (area-weighted) face normals around each vertex.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }
            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);
            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }

        self.normals = Some(normals);
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Normals are only used when there is exactly one per vertex.
    fn vertex_normals(&self) -> Option<&[Vec3]> {
        self.normals
            .as_deref()
            .filter(|normals| normals.len() == self.positions.len())
    }

    fn vertex_uvs(&self) -> Option<&[Vec2]> {
        self.uvs
            .as_deref()
            .filter(|uvs| uvs.len() == self.positions.len())
    }

    /// Resolve the index buffer into triangles.
    ///
    /// Triangles referencing out-of-range vertices are skipped with a warning.
    pub fn triangles(&self) -> Vec<MeshTriangle> {
        let normals = self.vertex_normals();
        let uvs = self.vertex_uvs();
        let mut triangles = Vec::with_capacity(self.triangle_count());

        for face in self.indices.chunks_exact(3) {
            let ids = [face[0] as usize, face[1] as usize, face[2] as usize];
            if ids.iter().any(|&i| i >= self.positions.len()) {
                log::warn!(
                    "Invalid triangle indices: {:?}, vertex count: {}",
                    ids,
                    self.positions.len()
                );
                continue;
            }

            triangles.push(MeshTriangle {
                positions: ids.map(|i| self.positions[i]),
                normals: normals.map(|n| ids.map(|i| n[i])),
                uvs: uvs.map_or([Vec2::ZERO; 3], |uv| ids.map(|i| uv[i])),
            });
        }

        triangles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> Mesh {
        Mesh::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 1, 3, 2],
        )
    }

    #[test]
    fn test_mesh_counts_and_bounds() {
        let mesh = two_triangles();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!((mesh.bounds.x.max - 1.0).abs() < 1e-3);
        assert!((mesh.bounds.y.min).abs() < 1e-3);
    }

    #[test]
    fn test_compute_normals_ccw_faces_point_up_z() {
        let mut mesh = two_triangles();
        mesh.compute_normals();
        for n in mesh.normals.as_ref().unwrap() {
            assert!((n.z - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_triangles_resolve_attributes() {
        let quad = Mesh::quad(2.0, 2.0);
        let tris = quad.triangles();
        assert_eq!(tris.len(), 2);
        assert_eq!(tris[0].positions[1], Vec3::new(1.0, -1.0, 0.0));
        assert_eq!(tris[0].normals, Some([Vec3::Z; 3]));
        assert_eq!(tris[1].uvs[2], Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_triangles_skip_invalid_indices() {
        let mut mesh = two_triangles();
        mesh.indices.extend_from_slice(&[0, 1, 9]);
        assert_eq!(mesh.triangles().len(), 2);
    }

    #[test]
    fn test_mismatched_normals_are_ignored() {
        let mesh = two_triangles().with_normals(vec![Vec3::Z]);
        assert!(mesh.triangles().iter().all(|t| t.normals.is_none()));
    }
}
