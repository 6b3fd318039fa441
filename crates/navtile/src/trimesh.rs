//! Triangle soups fed to the voxelizer.

use glam::{Affine3A, UVec3, Vec3};

use crate::math::Aabb3d;

/// A mesh used as input for voxelization.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TriMesh {
    /// The vertices composing the mesh.
    pub vertices: Vec<Vec3>,

    /// The indices composing the mesh.
    /// Follows the convention of a triangle list.
    pub indices: Vec<UVec3>,
}

impl TriMesh {
    /// Extends the trimesh with the vertices and indices of another trimesh.
    /// The indices of `other` will be offset by the number of vertices in `self`.
    pub fn extend(&mut self, other: TriMesh) {
        if self.vertices.len() > u32::MAX as usize {
            panic!("Cannot extend a trimesh with more than 2^32 vertices");
        }
        let next_vertex_index = self.vertices.len() as u32;
        self.vertices.extend(other.vertices);
        self.indices
            .extend(other.indices.iter().map(|i| i + next_vertex_index));
    }

    /// Computes the AABB of the trimesh.
    /// Returns `None` if the trimesh is empty.
    pub fn compute_aabb(&self) -> Option<Aabb3d> {
        Aabb3d::from_verts(&self.vertices)
    }

    /// Returns the corners of the triangle at `index`, transformed by `transform`.
    #[inline]
    pub fn triangle(&self, index: usize, transform: &Affine3A) -> [Vec3; 3] {
        let indices = self.indices[index];
        [
            transform.transform_point3(self.vertices[indices.x as usize]),
            transform.transform_point3(self.vertices[indices.y as usize]),
            transform.transform_point3(self.vertices[indices.z as usize]),
        ]
    }

    /// An axis-aligned box between `min` and `max`, with outward facing triangles.
    pub fn from_box(min: Vec3, max: Vec3) -> Self {
        let vertices = vec![
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ];
        let indices = vec![
            // bottom
            UVec3::new(0, 2, 1),
            UVec3::new(0, 3, 2),
            // top
            UVec3::new(4, 5, 6),
            UVec3::new(4, 6, 7),
            // -y
            UVec3::new(0, 1, 5),
            UVec3::new(0, 5, 4),
            // +x
            UVec3::new(1, 2, 6),
            UVec3::new(1, 6, 5),
            // +y
            UVec3::new(2, 3, 7),
            UVec3::new(2, 7, 6),
            // -x
            UVec3::new(3, 0, 4),
            UVec3::new(3, 4, 7),
        ];
        Self { vertices, indices }
    }

    /// A flat, upward facing quad at height `z`.
    pub fn from_quad(min: Vec3, max: Vec3) -> Self {
        let z = min.z;
        Self {
            vertices: vec![
                Vec3::new(min.x, min.y, z),
                Vec3::new(max.x, min.y, z),
                Vec3::new(max.x, max.y, z),
                Vec3::new(min.x, max.y, z),
            ],
            indices: vec![UVec3::new(0, 1, 2), UVec3::new(0, 2, 3)],
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::math::TriangleVertices as _;

    use super::*;

    #[test]
    fn extend_offsets_indices() {
        let mut mesh = TriMesh::from_quad(Vec3::ZERO, Vec3::ONE);
        mesh.extend(TriMesh::from_quad(Vec3::ZERO, Vec3::ONE));
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices[2], UVec3::new(4, 5, 6));
    }

    #[test]
    fn box_triangles_face_outwards() {
        let mesh = TriMesh::from_box(Vec3::ZERO, Vec3::ONE);
        let center = Vec3::splat(0.5);
        for i in 0..mesh.indices.len() {
            let triangle = mesh.triangle(i, &Affine3A::IDENTITY);
            let face_center = (triangle[0] + triangle[1] + triangle[2]) / 3.0;
            assert!(triangle.normal().dot(face_center - center) > 0.0, "triangle {i}");
        }
    }

    #[test]
    fn quad_faces_up() {
        let mesh = TriMesh::from_quad(Vec3::ZERO, Vec3::ONE);
        let triangle = mesh.triangle(0, &Affine3A::from_translation(Vec3::Z));
        assert_eq!(triangle.normal(), Vec3::Z);
        assert_eq!(triangle[0].z, 1.0);
        assert_eq!(mesh.compute_aabb().unwrap().max, Vec3::new(1.0, 1.0, 0.0));
    }
}
