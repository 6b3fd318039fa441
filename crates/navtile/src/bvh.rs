//! Bounding volume hierarchy over the triangles of a tile, built with a binned surface area heuristic.

use glam::Vec3;

use crate::{
    math::{Aabb3d, TriangleVertices as _},
    tile::TileTriangle,
};

/// A node of a tile's bounding volume hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BvNode {
    /// Box around everything below this node, tile-local.
    pub aabb: Aabb3d,
    /// What the node holds.
    pub kind: BvNodeKind,
}

/// Distinguishes leaves from internal nodes of a [`BvNode`] tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BvNodeKind {
    /// A single triangle.
    Leaf {
        /// Index of the triangle in the tile.
        triangle: u16,
    },
    /// Two children. The first one directly follows this node.
    Internal {
        /// Distance from this node to its second child in the node array.
        second_child: u32,
    },
}

impl BvNode {
    /// Returns `true` if the node holds a triangle.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BvNodeKind::Leaf { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct BuildItem {
    triangle: u16,
    aabb: Aabb3d,
    centroid: Vec3,
    bin: usize,
}

#[derive(Debug, Clone, Copy)]
struct Bin {
    aabb: Aabb3d,
    count: usize,
}

const MAX_BIN_COUNT: usize = 8;
/// Centroid spreads below this use two bins only.
const MIN_BIN_EXTENT: f32 = 0.001;

/// Builds the hierarchy over `triangles` into `nodes`, replacing its previous content.
pub fn build_bv_tree(vertices: &[Vec3], triangles: &[TileTriangle], nodes: &mut Vec<BvNode>) {
    nodes.clear();
    if triangles.is_empty() {
        return;
    }
    let mut items: Vec<_> = triangles
        .iter()
        .enumerate()
        .map(|(index, triangle)| {
            let corners = triangle.vertices.map(|v| vertices[v as usize]);
            BuildItem {
                triangle: index as u16,
                aabb: corners.aabb(),
                centroid: (corners[0] + corners[1] + corners[2]) / 3.0,
                bin: 0,
            }
        })
        .collect();
    nodes.reserve(items.len() * 2 - 1);
    split_sah(&mut items, nodes);
}

fn split_sah(items: &mut [BuildItem], nodes: &mut Vec<BvNode>) {
    let mut aabb = Aabb3d::EMPTY;
    let mut centroid_aabb = Aabb3d::EMPTY;
    for item in items.iter() {
        aabb.merge(&item.aabb);
        centroid_aabb.grow(item.centroid);
    }

    let node_index = nodes.len();
    if let [item] = items {
        nodes.push(BvNode {
            aabb,
            kind: BvNodeKind::Leaf {
                triangle: item.triangle,
            },
        });
        return;
    }
    nodes.push(BvNode {
        aabb,
        kind: BvNodeKind::Internal { second_child: 0 },
    });

    let axis = longest_axis(aabb.size());
    let mid = binned_split(items, &centroid_aabb, axis, &aabb)
        .unwrap_or_else(|| median_split(items, axis));

    let (left, right) = items.split_at_mut(mid);
    split_sah(left, nodes);
    let second_child = (nodes.len() - node_index) as u32;
    nodes[node_index].kind = BvNodeKind::Internal { second_child };
    split_sah(right, nodes);
}

fn longest_axis(size: Vec3) -> usize {
    if size.y >= size.z && size.y > size.x {
        1
    } else if size.z > size.y && size.z > size.x {
        2
    } else {
        0
    }
}

/// Partitions `items` at the cheapest bin boundary. Returns the size of the left part,
/// or `None` if no boundary beats leaving the node unsplit.
fn binned_split(
    items: &mut [BuildItem],
    centroid_aabb: &Aabb3d,
    axis: usize,
    aabb: &Aabb3d,
) -> Option<usize> {
    let extent = centroid_aabb.max[axis] - centroid_aabb.min[axis];
    let bin_count = if extent > MIN_BIN_EXTENT { MAX_BIN_COUNT } else { 2 };
    let bin_conv = if extent > 0.0 {
        (bin_count as f32 - 0.001) / extent
    } else {
        0.0
    };

    let mut bins = [Bin {
        aabb: Aabb3d::EMPTY,
        count: 0,
    }; MAX_BIN_COUNT];
    for item in items.iter_mut() {
        let bin = ((item.centroid[axis] - centroid_aabb.min[axis]) * bin_conv) as usize;
        item.bin = bin.min(bin_count - 1);
        bins[item.bin].aabb.merge(&item.aabb);
        bins[item.bin].count += 1;
    }

    // Right-to-left sweep of the areas of everything right of each boundary.
    let mut right_costs = [0.0_f32; MAX_BIN_COUNT];
    let mut right_aabb = Aabb3d::EMPTY;
    let mut right_count = 0;
    for i in (1..bin_count).rev() {
        right_aabb.merge(&bins[i].aabb);
        right_count += bins[i].count;
        right_costs[i] = if right_count > 0 {
            right_aabb.surface_area() * right_count as f32
        } else {
            0.0
        };
    }

    let mut lowest_cost = aabb.surface_area() * items.len() as f32;
    let mut split = None;
    let mut left_aabb = Aabb3d::EMPTY;
    let mut left_count = 0;
    for i in 0..bin_count - 1 {
        left_aabb.merge(&bins[i].aabb);
        left_count += bins[i].count;
        if left_count == 0 || left_count == items.len() {
            continue;
        }
        let cost = left_aabb.surface_area() * left_count as f32 + right_costs[i + 1];
        if cost < lowest_cost {
            lowest_cost = cost;
            split = Some(i);
        }
    }

    let split = split?;
    items.sort_by_key(|item| item.bin);
    Some(items.partition_point(|item| item.bin <= split))
}

/// Sorts `items` by centroid and splits them in half.
fn median_split(items: &mut [BuildItem], axis: usize) -> usize {
    items.sort_by(|a, b| {
        a.centroid[axis]
            .total_cmp(&b.centroid[axis])
            .then(a.aabb.min[axis].total_cmp(&b.aabb.min[axis]))
    });
    items.len() / 2
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::area::AreaAnnotation;

    use super::*;

    fn grid_mesh(count: usize) -> (Vec<Vec3>, Vec<TileTriangle>) {
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        for i in 0..count {
            let x = (i % 7) as f32;
            let y = (i / 7) as f32;
            let z = (i % 3) as f32 * 0.25;
            let base = vertices.len() as u16;
            vertices.push(Vec3::new(x, y, z));
            vertices.push(Vec3::new(x + 1.0, y, z));
            vertices.push(Vec3::new(x, y + 1.0, z + 0.1));
            triangles.push(TileTriangle {
                vertices: [base, base + 1, base + 2],
                area: AreaAnnotation::default(),
                island: 0,
            });
        }
        (vertices, triangles)
    }

    #[track_caller]
    fn assert_contains(outer: &Aabb3d, inner: &Aabb3d) {
        assert!(
            outer.contains_aabb(inner),
            "{inner:?} is not contained in {outer:?}"
        );
    }

    /// Walks the subtree at `index`, checking containment, and returns the index after it.
    fn check_subtree(
        nodes: &[BvNode],
        index: usize,
        leaves: &mut Vec<u16>,
        leaf_union: &mut Aabb3d,
    ) -> usize {
        let node = nodes[index];
        match node.kind {
            BvNodeKind::Leaf { triangle } => {
                leaves.push(triangle);
                leaf_union.merge(&node.aabb);
                index + 1
            }
            BvNodeKind::Internal { second_child } => {
                let left = index + 1;
                let right = index + second_child as usize;
                assert_contains(&node.aabb, &nodes[left].aabb);
                assert_contains(&node.aabb, &nodes[right].aabb);
                let after_left = check_subtree(nodes, left, leaves, leaf_union);
                assert_eq!(after_left, right, "second child must follow the first subtree");
                check_subtree(nodes, right, leaves, leaf_union)
            }
        }
    }

    #[test]
    fn builds_nothing_for_no_triangles() {
        let mut nodes = vec![];
        build_bv_tree(&[], &[], &mut nodes);
        assert!(nodes.is_empty());
    }

    #[test]
    fn single_triangle_is_a_leaf() {
        let (vertices, triangles) = grid_mesh(1);
        let mut nodes = vec![];
        build_bv_tree(&vertices, &triangles, &mut nodes);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, BvNodeKind::Leaf { triangle: 0 });
    }

    #[test]
    fn tree_is_well_formed() {
        for count in [2, 3, 10, 57] {
            let (vertices, triangles) = grid_mesh(count);
            let mut nodes = vec![];
            build_bv_tree(&vertices, &triangles, &mut nodes);
            assert_eq!(nodes.len(), count * 2 - 1);

            let mut leaves = vec![];
            let mut leaf_union = Aabb3d::EMPTY;
            let end = check_subtree(&nodes, 0, &mut leaves, &mut leaf_union);
            assert_eq!(end, nodes.len());
            assert_eq!(leaf_union, nodes[0].aabb);

            let unique: BTreeSet<_> = leaves.iter().copied().collect();
            assert_eq!(unique.len(), count);
            assert_eq!(leaves.len(), count);
        }
    }

    #[test]
    fn coincident_centroids_fall_back_to_median() {
        let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        let triangle = TileTriangle {
            vertices: [0, 1, 2],
            ..Default::default()
        };
        let triangles = vec![triangle; 4];
        let mut nodes = vec![];
        build_bv_tree(&vertices, &triangles, &mut nodes);
        assert_eq!(nodes.len(), 7);
        assert_eq!(nodes[0].kind, BvNodeKind::Internal { second_child: 4 });
    }
}
