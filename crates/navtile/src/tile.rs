//! The output of a tile build.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::{
    area::AreaAnnotation,
    bvh::{BvNode, BvNodeKind},
    config::MarkupId,
    math::Aabb3d,
};

/// A triangle of a [`Tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TileTriangle {
    /// Indices into [`Tile::vertices`].
    pub vertices: [u16; 3],
    /// The annotation of the area the triangle belongs to.
    pub area: AreaAnnotation,
    /// Connectivity island, filled in by the navigation system once tiles are linked. Always 0 here.
    pub island: u32,
}

/// A navigation mesh tile.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Tile {
    /// Vertices relative to the tile origin. `[Units: wu]`
    pub vertices: Vec<Vec3>,
    /// The triangles.
    pub triangles: Vec<TileTriangle>,
    /// Bounding volume hierarchy over [`Tile::triangles`] in pre-order. Empty if it wasn't requested.
    pub nodes: Vec<BvNode>,
    /// The content hash of the inputs the tile was built from.
    pub hash_value: u32,
}

impl Tile {
    /// Returns the corners of a triangle.
    #[inline]
    pub fn triangle_vertices(&self, triangle: usize) -> [Vec3; 3] {
        self.triangles[triangle].vertices.map(|index| self.vertices[index as usize])
    }

    /// The summed area of all triangles projected onto the xy-plane. `[Units: wu²]`
    pub fn area_2d(&self) -> f32 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.triangle_vertices(i);
                0.5 * (b - a).truncate().perp_dot((c - a).truncate()).abs()
            })
            .sum()
    }

    /// Collects the indices of all triangles whose bounding box overlaps `aabb`, using the BVH.
    ///
    /// `aabb` is in tile-local coordinates.
    pub fn query_triangles(&self, aabb: &Aabb3d, out: &mut Vec<u16>) {
        out.clear();
        let Some(root) = self.nodes.first() else {
            return;
        };
        let mut stack = vec![(0_usize, *root)];
        while let Some((index, node)) = stack.pop() {
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            match node.kind {
                BvNodeKind::Leaf { triangle } => out.push(triangle),
                BvNodeKind::Internal { second_child } => {
                    let right = index + second_child as usize;
                    stack.push((right, self.nodes[right]));
                    stack.push((index + 1, self.nodes[index + 1]));
                }
            }
        }
    }
}

/// Per-tile data that doesn't live in the [`Tile`] itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TileMetaData {
    /// For every markup with [`MarkupVolume::store_triangles`](crate::MarkupVolume::store_triangles),
    /// the indices of the triangles generated inside it.
    pub markup_triangles: BTreeMap<MarkupId, Vec<u16>>,
}

impl TileMetaData {
    /// Removes all entries.
    pub fn clear(&mut self) {
        self.markup_triangles.clear();
    }
}
