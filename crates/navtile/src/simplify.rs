//! Reduces traced contours to the vertices that shape them.

use glam::{IVec2, IVec3};

use crate::{
    contours::{Contour, ContourVertexFlags, Region},
    math::{dist_point_to_segment_sq, dist_point_to_segment_sq_2d},
};

/// Vertices further than this from the simplified outline on the ground plane are kept. `[Units: vx²]`
const TOLERANCE_2D_SQ: f32 = 7.0;
/// Vertices further than this from the simplified outline are kept. `[Units: vx²]`
const TOLERANCE_3D_SQ: f32 = 11.0;

/// A simplified region outline, ready for triangulation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Polygon {
    /// The outer outline in voxel coordinates.
    pub contour: Vec<IVec3>,
    /// Simplified hole outlines.
    pub holes: Vec<Hole>,
    /// The paint of the region the polygon was made from.
    pub paint: u16,
}

/// A simplified hole outline with a bounding circle on the ground plane.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hole {
    /// The outline in voxel coordinates.
    pub verts: Vec<IVec3>,
    /// The integer average of the vertices.
    pub center: IVec2,
    /// Distance from `center` to the furthest vertex, rounded up. `[Units: vx]`
    pub radius: i32,
}

impl Hole {
    fn new(verts: Vec<IVec3>) -> Self {
        let count = verts.len() as i32;
        let sum = verts.iter().fold(IVec2::ZERO, |sum, v| sum + v.truncate());
        let center = sum / count;
        let radius = verts
            .iter()
            .map(|v| {
                let offset = (v.truncate() - center).as_vec2();
                offset.length().ceil() as i32
            })
            .max()
            .unwrap_or(0);
        Self {
            verts,
            center,
            radius,
        }
    }
}

fn is_vertical_boundary(contour: &Contour, index: usize) -> bool {
    contour[index]
        .flags
        .contains(ContourVertexFlags::TILE_BOUNDARY_V)
}

/// Picks the contour vertices that must survive simplification, in contour order.
fn seed_vertices(contour: &Contour) -> Vec<usize> {
    let last = contour.len() - 1;
    let mut seeds: Vec<usize> = Vec::new();
    let mut boundary = is_vertical_boundary(contour, last);

    for (i, vertex) in contour.iter().enumerate() {
        if is_vertical_boundary(contour, i) {
            // Keep the first vertex of a run along the vertical border.
            if !boundary || !vertex.is_removable() {
                seeds.push(i);
            }
            boundary = true;
        } else {
            // And the last one.
            if boundary && i > 0 && seeds.last() != Some(&(i - 1)) {
                seeds.push(i - 1);
            }
            if !vertex.is_removable() {
                seeds.push(i);
            }
            boundary = false;
        }
    }

    if seeds.last().is_some_and(|&seed| seed != last)
        && is_vertical_boundary(contour, last)
        && !is_vertical_boundary(contour, 0)
    {
        seeds.push(last);
    }

    if seeds.is_empty() {
        // Start with the two vertices furthest apart along x.
        let key = |i: &usize| (contour[*i].x, contour[*i].y);
        let min = (0..contour.len()).min_by_key(key).unwrap_or(0);
        let max = (0..contour.len()).rev().max_by_key(key).unwrap_or(0);
        seeds.extend([min, max]);
    }
    seeds
}

/// Inserts the vertex deviating most from each simplified edge until all remaining vertices are within tolerance.
fn refine(contour: &Contour, simplified: &mut Vec<usize>) {
    let count = contour.len();
    let mut s0 = 0;
    while s0 < simplified.len() {
        let s1 = (s0 + 1) % simplified.len();
        let i0 = simplified[s0];
        let i1 = simplified[s1];
        let last = if i0 < i1 { i1 } else { count + i1 };
        let v0 = contour[i0].position();
        let v1 = contour[i1].position();

        // Always measure in the same direction so that both sides of a shared edge agree.
        let reverse = (v0.x, v0.y, v0.z) >= (v1.x, v1.y, v1.z);
        let (a, b) = if reverse { (v1, v0) } else { (v0, v1) };

        let mut max_2d = (f32::MIN, 0);
        let mut max_3d = (f32::MIN, 0);
        for step in 0..last - i0 - 1 {
            let v = if reverse { last - 1 - step } else { i0 + 1 + step };
            let index = v % count;
            let p = contour[index].position();
            let d3 = dist_point_to_segment_sq(p, a, b);
            let d2 = dist_point_to_segment_sq_2d(p, a, b);
            if d2 > max_2d.0 {
                max_2d = (d2, index);
            }
            if d3 > max_3d.0 {
                max_3d = (d3, index);
            }
        }

        let insert = if max_3d.0 >= TOLERANCE_3D_SQ {
            Some(max_3d.1)
        } else if max_2d.0 >= TOLERANCE_2D_SQ {
            Some(max_2d.1)
        } else {
            None
        };
        match insert {
            Some(index) => simplified.insert(s0 + 1, index),
            None => s0 += 1,
        }
    }
}

/// Removes spikes: repeated vertices and vertices that lead back where they came from.
fn remove_degenerates(contour: &Contour, simplified: &mut Vec<usize>) {
    let same = |i: usize, j: usize| i == j || contour[i].position() == contour[j].position();
    if simplified.len() <= 2 {
        return;
    }
    let mut a = simplified.len() - 2;
    let mut b = simplified.len() - 1;
    let mut c = 0;
    while simplified.len() > 2 && c < simplified.len() {
        if same(simplified[a], simplified[b]) {
            simplified.remove(b);
            if b < a {
                a -= 1;
            }
        } else if same(simplified[a], simplified[c]) {
            let (low, high) = (b.min(c), b.max(c));
            simplified.remove(high);
            simplified.remove(low);
            a -= (low < a) as usize + (high < a) as usize;
        } else {
            a = b;
            b = c;
            c += 1;
            continue;
        }
        let len = simplified.len();
        if len <= 2 {
            break;
        }
        a %= len;
        b = (a + 1) % len;
        c = (a + 2) % len;
    }
}

/// Simplifies a closed contour. Returns `None` if fewer than three vertices survive.
pub(crate) fn simplify_contour(contour: &Contour) -> Option<Vec<IVec3>> {
    if contour.is_empty() {
        return None;
    }
    let mut simplified = seed_vertices(contour);
    refine(contour, &mut simplified);
    remove_degenerates(contour, &mut simplified);
    (simplified.len() > 2).then(|| {
        simplified
            .iter()
            .map(|&index| contour[index].position())
            .collect()
    })
}

/// Turns every region with a usable outline into a [`Polygon`].
pub(crate) fn simplify_regions(regions: &[Region], polygons: &mut Vec<Polygon>) {
    polygons.clear();
    for region in regions.iter().filter(|region| region.contour.len() >= 3) {
        let Some(contour) = simplify_contour(&region.contour) else {
            continue;
        };
        let holes = region
            .holes
            .iter()
            .filter_map(simplify_contour)
            .map(Hole::new)
            .collect();
        polygons.push(Polygon {
            contour,
            holes,
            paint: region.paint,
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::contours::ContourVertex;

    use super::*;

    fn contour(points: &[(u16, u16)], flags: ContourVertexFlags) -> Contour {
        points
            .iter()
            .map(|&(x, y)| ContourVertex { x, y, z: 3, flags })
            .collect()
    }

    /// The outline of a `size` square walked one voxel at a time, clockwise from the origin.
    fn square_walk(size: u16) -> Vec<(u16, u16)> {
        let mut points = vec![];
        points.extend((0..size).map(|y| (0, y)));
        points.extend((0..size).map(|x| (x, size)));
        points.extend((0..size).map(|y| (size, size - y)));
        points.extend((0..size).map(|x| (size - x, 0)));
        points
    }

    #[test]
    fn unremovable_vertices_survive() {
        let mut contour = contour(&square_walk(8), ContourVertexFlags::empty());
        for vertex in &mut contour {
            if (vertex.x == 0 || vertex.x == 8) && (vertex.y == 0 || vertex.y == 8) {
                vertex.flags = ContourVertexFlags::UNREMOVABLE;
            }
        }
        let simplified = simplify_contour(&contour).unwrap();
        assert_eq!(
            simplified,
            [(0, 0), (0, 8), (8, 8), (8, 0)].map(|(x, y)| IVec3::new(x, y, 3))
        );
    }

    #[test]
    fn removable_outline_keeps_its_shape() {
        let contour = contour(&square_walk(10), ContourVertexFlags::empty());
        let simplified = simplify_contour(&contour).unwrap();
        for corner in [(0, 0), (0, 10), (10, 10), (10, 0)] {
            assert!(
                simplified.contains(&IVec3::new(corner.0, corner.1, 3)),
                "{corner:?} missing from {simplified:?}"
            );
        }
        assert_eq!(simplified.len(), 4);
    }

    #[test]
    fn small_bumps_are_smoothed() {
        let mut points = square_walk(12);
        // A one voxel notch on the bottom edge.
        let notch = points.iter().position(|&p| p == (6, 0)).unwrap();
        points[notch] = (6, 1);
        let mut contour = contour(&points, ContourVertexFlags::empty());
        contour[0].flags = ContourVertexFlags::UNREMOVABLE;
        let simplified = simplify_contour(&contour).unwrap();
        assert!(!simplified.contains(&IVec3::new(6, 1, 3)));
    }

    #[test]
    fn collapsed_contours_are_dropped() {
        let contour = contour(&[(0, 0), (4, 0), (0, 0)], ContourVertexFlags::UNREMOVABLE);
        assert_eq!(simplify_contour(&contour), None);
    }

    #[test]
    fn holes_get_a_bounding_circle() {
        let outer = contour(&[(0, 0), (0, 20), (20, 20), (20, 0)], ContourVertexFlags::UNREMOVABLE);
        let hole = contour(&[(8, 8), (12, 8), (12, 12), (8, 12)], ContourVertexFlags::UNREMOVABLE);
        let regions = [
            Region {
                contour: outer,
                holes: vec![hole],
                span_count: 384,
                paint: 2,
                ..Default::default()
            },
            Region::default(),
        ];
        let mut polygons = vec![];
        simplify_regions(&regions, &mut polygons);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].paint, 2);
        let hole = &polygons[0].holes[0];
        assert_eq!(hole.center, IVec2::new(10, 10));
        // sqrt(8) rounded up.
        assert_eq!(hole.radius, 3);
    }
}
