//! The triangle mesh assembled while generating a tile.

use std::collections::HashMap;

use glam::{IVec3, Vec3};

use crate::{area::AreaAnnotation, hash::HashComputer, tile::TileTriangle};

/// A triangle soup with deduplicated vertices, in tile-local coordinates.
///
/// Triangles are added by the triangulation stage and by extensions.
#[derive(Debug, Clone, Default)]
pub struct GeneratedMesh {
    origin: Vec3,
    vertices: Vec<Vec3>,
    triangles: Vec<TileTriangle>,
    lookup: HashMap<IVec3, u16>,
    dropped_triangles: usize,
    hasher: HashComputer,
}

impl GeneratedMesh {
    /// Hard limit on the number of triangles in a tile.
    pub const MAX_TRIANGLE_COUNT: usize = 1024;
    /// Vertices closer than `1 / VERTEX_QUANTIZATION` world units share an index.
    pub const VERTEX_QUANTIZATION: f32 = 1024.0;

    /// Empties the mesh while keeping its allocations, and moves it to a new tile origin.
    pub fn clear(&mut self, origin: Vec3) {
        self.origin = origin;
        self.vertices.clear();
        self.triangles.clear();
        self.lookup.clear();
        self.dropped_triangles = 0;
        self.hasher = HashComputer::default();
    }

    /// The world space minimum corner of the tile.
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// The tile-local vertices.
    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// The triangles.
    #[inline]
    pub fn triangles(&self) -> &[TileTriangle] {
        &self.triangles
    }

    /// Returns `true` if the mesh has no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// The number of triangles rejected because the mesh was full.
    #[inline]
    pub fn dropped_triangles(&self) -> usize {
        self.dropped_triangles
    }

    /// Restarts the running content hash from `seed`.
    pub fn reset_hash_seed(&mut self, seed: u32) {
        self.hasher = HashComputer::new(seed);
    }

    /// Finalizes the running content hash and returns it.
    pub fn complete_and_get_hash_value(&mut self) -> u32 {
        self.hasher.complete();
        self.hasher.value()
    }

    /// Adds world space triangles, folding them into the content hash.
    ///
    /// Degenerate triangles are skipped. Returns `false` once the mesh is full.
    pub fn add_triangles_world(&mut self, triangles: &[[Vec3; 3]], area: AreaAnnotation) -> bool {
        for triangle in triangles {
            for vertex in triangle {
                self.hasher.add_vec3(*vertex);
            }
            if self.triangles.len() >= Self::MAX_TRIANGLE_COUNT {
                self.dropped_triangles += 1;
                continue;
            }

            let mut indices = [0_u16; 3];
            let mut valid = true;
            for (index, vertex) in indices.iter_mut().zip(triangle) {
                match self.insert_vertex(*vertex - self.origin) {
                    Some(inserted) => *index = inserted,
                    None => valid = false,
                }
            }
            if !valid {
                continue;
            }
            if indices[0] == indices[1] || indices[1] == indices[2] || indices[0] == indices[2] {
                tracing::warn!(
                    "Skipping degenerate triangle {:?} added at tile {}",
                    triangle,
                    self.origin
                );
                continue;
            }
            self.push_triangle(indices, area);
        }
        if self.dropped_triangles > 0 {
            tracing::warn!(
                "Tile at {} is full, {} triangles were dropped",
                self.origin,
                self.dropped_triangles
            );
        }
        self.triangles.len() < Self::MAX_TRIANGLE_COUNT
    }

    /// Returns the index of the vertex at `local`, inserting it if there is none yet.
    ///
    /// Returns `None` if the vertex buffer cannot be addressed with 16-bit indices anymore.
    pub(crate) fn insert_vertex(&mut self, local: Vec3) -> Option<u16> {
        let key = (local * Self::VERTEX_QUANTIZATION).round().as_ivec3();
        if let Some(index) = self.lookup.get(&key) {
            return Some(*index);
        }
        let Ok(index) = u16::try_from(self.vertices.len()) else {
            tracing::warn!("Tile at {} ran out of vertex indices", self.origin);
            return None;
        };
        self.vertices.push(local);
        self.lookup.insert(key, index);
        Some(index)
    }

    /// Appends a triangle. Returns its index, or `None` if the mesh is full.
    pub(crate) fn push_triangle(&mut self, vertices: [u16; 3], area: AreaAnnotation) -> Option<u16> {
        if self.triangles.len() >= Self::MAX_TRIANGLE_COUNT {
            self.dropped_triangles += 1;
            return None;
        }
        let index = self.triangles.len() as u16;
        self.triangles.push(TileTriangle {
            vertices,
            area,
            island: 0,
        });
        Some(index)
    }
}
