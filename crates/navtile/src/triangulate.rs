//! Ear clipping of the simplified polygons into the tile mesh.

use glam::{I64Vec2, IVec2, IVec3, Vec3};

use crate::{
    config::MarkupVolume,
    mesh::GeneratedMesh,
    paint::{OK_PAINT_START, PaintData},
    simplify::{Hole, Polygon},
    tile::TileMetaData,
};

/// Upper bound for the length of a bridge between an outline and a hole. `[Units: vx]`
const MAX_BRIDGE_LENGTH: i32 = 10000;

/// Heights count this much more than horizontal distance when picking the shortest ear diagonal.
const DIAGONAL_HEIGHT_WEIGHT: i32 = 5;

#[derive(Debug, Clone, Copy)]
struct PolygonVertex {
    pos: IVec3,
    ear: bool,
}

impl From<IVec3> for PolygonVertex {
    fn from(pos: IVec3) -> Self {
        Self { pos, ear: false }
    }
}

/// `(b - a) x (c - a)` on the ground plane.
#[inline]
fn cross_2d(a: IVec3, b: IVec3, c: IVec3) -> i64 {
    let ab = (b - a).truncate().as_i64vec2();
    let ac = (c - a).truncate().as_i64vec2();
    ab.perp_dot(ac)
}

/// Returns `true` if the corner at `b` turns left. Outlines run clockwise, so such corners point inwards.
#[inline]
fn is_reflex(a: IVec3, b: IVec3, c: IVec3) -> bool {
    cross_2d(a, b, c) > 0
}

/// Inward normal of the clockwise edge `a..b`.
#[inline]
fn inward(a: IVec3, b: IVec3) -> IVec2 {
    IVec2::new(b.y - a.y, a.x - b.x)
}

/// Checks whether the segments `a0..a1` and `b0..b1` intersect, endpoints included.
fn segments_touch(a0: IVec2, a1: IVec2, b0: IVec2, b1: IVec2) -> bool {
    let e = (b0 - a0).as_i64vec2();
    let da = (a1 - a0).as_i64vec2();
    let db = (b1 - b0).as_i64vec2();
    let det = da.perp_dot(db);
    if det == 0 {
        return false;
    }
    let sign = det.signum();
    let range = 0..=det * sign;
    range.contains(&(e.perp_dot(db) * sign)) && range.contains(&(e.perp_dot(da) * sign))
}

/// The ring of vertices still waiting to be clipped.
struct EarClipper<'a> {
    vertices: &'a mut [PolygonVertex],
    indices: Vec<usize>,
    agent_height: i32,
}

impl EarClipper<'_> {
    fn corner(&self, at: usize) -> [IVec3; 3] {
        let count = self.indices.len();
        let prev = self.indices[(at + count - 1) % count];
        let next = self.indices[(at + 1) % count];
        [
            self.vertices[prev].pos,
            self.vertices[self.indices[at]].pos,
            self.vertices[next].pos,
        ]
    }

    /// No remaining vertex within reach of the triangle's height lies strictly inside it.
    fn is_ear(&self, at: usize) -> bool {
        let [v0, v1, v2] = self.corner(at);
        let min_z = v0.z.min(v1.z).min(v2.z);
        let max_z = v0.z.max(v1.z).max(v2.z);
        let edges = [(v0, v1), (v1, v2), (v2, v0)];
        !self.indices.iter().any(|&index| {
            let p = self.vertices[index].pos;
            if p.z > max_z + self.agent_height || p.z < min_z - 1 {
                return false;
            }
            edges.iter().all(|&(from, to)| {
                let edge = (from - to).truncate().as_i64vec2();
                let offset = (p - from).truncate().as_i64vec2();
                offset.x * edge.y - offset.y * edge.x < 0
            })
        })
    }

    fn classify(&mut self, at: usize) {
        let [a, b, c] = self.corner(at);
        let ear = !is_reflex(a, b, c) && self.is_ear(at);
        self.vertices[self.indices[at]].ear = ear;
    }

    /// Counts the remaining vertices inside the circle through the corner at `at`.
    fn vertices_in_circumcircle(&self, at: usize) -> usize {
        let count = self.indices.len();
        let [v0, v1, v2] = self.corner(at);
        let min_z = v0.z.min(v1.z).min(v2.z);
        let max_z = v0.z.max(v1.z).max(v2.z);
        let d0 = (v0 - v1).truncate().as_i64vec2();
        let d2 = (v2 - v1).truncate().as_i64vec2();
        let cos = d0.dot(d2);
        let sin = d0.y * d2.x - d0.x * d2.y;

        (0..count - 3)
            .map(|k| self.vertices[self.indices[(at + 2 + k) % count]].pos)
            .filter(|p| p.z <= max_z + self.agent_height && p.z + self.agent_height >= min_z)
            .filter(|p| {
                let p0: I64Vec2 = (v0 - *p).truncate().as_i64vec2();
                let p2: I64Vec2 = (v2 - *p).truncate().as_i64vec2();
                cos * (p2.x * p0.y - p0.x * p2.y) <= sin * (p2.x * p0.x + p0.y * p2.y)
            })
            .count()
    }

    /// Picks the ear to clip next: the shortest Delaunay ear if there is one,
    /// otherwise the ear with the fewest vertices in its circumcircle.
    fn best_ear(&self) -> Option<usize> {
        let mut best_delaunay: Option<(i32, usize)> = None;
        let mut best: Option<(usize, i32, usize)> = None;
        for at in 0..self.indices.len() {
            if !self.vertices[self.indices[at]].ear {
                continue;
            }
            let inside = self.vertices_in_circumcircle(at);
            let [v0, _, v2] = self.corner(at);
            let d = v2 - v0;
            let diagonal_sq = d.x * d.x + d.y * d.y + (DIAGONAL_HEIGHT_WEIGHT * d.z).pow(2);

            if best.is_none_or(|(count, diagonal, _)| (inside, diagonal_sq) < (count, diagonal)) {
                best = Some((inside, diagonal_sq, at));
            }
            if inside == 0 && best_delaunay.is_none_or(|(diagonal, _)| diagonal_sq < diagonal) {
                best_delaunay = Some((diagonal_sq, at));
            }
        }
        best_delaunay
            .map(|(_, at)| at)
            .or(best.map(|(_, _, at)| at))
            .or((self.indices.len() == 3).then_some(1))
    }

    /// Removes the vertex at `at` and reclassifies its neighbours.
    fn clip(&mut self, at: usize) {
        self.indices.remove(at);
        let count = self.indices.len();
        if count < 3 {
            return;
        }
        let prev = (at + count - 1) % count;
        let next = at % count;
        self.classify(prev);
        self.classify(next);
    }
}

/// Converts [`Polygon`]s in voxel coordinates into tile mesh triangles.
pub(crate) struct Triangulation<'a> {
    /// `[Units: vx]`
    pub(crate) agent_height: u16,
    pub(crate) border_h: u16,
    pub(crate) border_v: u16,
    pub(crate) voxel_size: Vec3,
    pub(crate) palette: &'a [PaintData],
    pub(crate) markups: &'a [MarkupVolume],
}

impl Triangulation<'_> {
    /// Triangulates every polygon. Returns the number of triangles added to `mesh`.
    pub(crate) fn triangulate(
        &self,
        polygons: &[Polygon],
        mesh: &mut GeneratedMesh,
        metadata: &mut TileMetaData,
    ) -> usize {
        let mut total = 0;
        for polygon in polygons {
            let Some(paint) = polygon
                .paint
                .checked_sub(OK_PAINT_START)
                .and_then(|slot| self.palette.get(slot as usize))
            else {
                tracing::warn!("Polygon with unwalkable paint {} skipped", polygon.paint);
                continue;
            };

            let mut contour: Vec<PolygonVertex> =
                polygon.contour.iter().copied().map(PolygonVertex::from).collect();
            let mut holes = polygon.holes.clone();
            while !holes.is_empty() {
                self.merge_closest_hole(&mut contour, &mut holes);
            }

            let first = mesh.triangles().len();
            let added = self.clip_ears(&mut contour, paint, mesh);
            total += added;

            if let Some(markup) = paint.markup.and_then(|index| self.markups.get(index)) {
                let triangles = metadata.markup_triangles.entry(markup.id).or_default();
                triangles.extend((first..first + added).map(|index| index as u16));
            }
        }
        total
    }

    /// Bridges the outline to the nearest vertex of the closest hole and splices the hole in.
    fn merge_closest_hole(&self, contour: &mut Vec<PolygonVertex>, holes: &mut Vec<Hole>) {
        let agent_height = self.agent_height as i32;
        let count = contour.len();
        let mut best_dist = MAX_BRIDGE_LENGTH;
        let mut best_contour = 0;
        let mut best_hole = 0;
        let mut best_hole_vertex = 0;

        // Both rings are searched starting from their last vertex.
        for ci1 in (0..count).map(|i| (i + count - 1) % count) {
            let cv0 = contour[(ci1 + count - 1) % count].pos;
            let cv1 = contour[ci1].pos;
            let cv2 = contour[(ci1 + 1) % count].pos;
            let c_in0 = inward(cv0, cv1);
            let c_in1 = inward(cv1, cv2);
            let c_reflex = c_in0.dot((cv2 - cv1).truncate()) < 0;
            // Reflex corners accept anything inside either edge, convex corners need both.
            let accepts = |a: bool, b: bool| if c_reflex { a || b } else { a && b };

            for (hi, hole) in holes.iter().enumerate() {
                let center_dist_sq = (hole.center - cv1.truncate()).length_squared();
                if best_dist != MAX_BRIDGE_LENGTH && center_dist_sq >= (hole.radius + best_dist).pow(2) {
                    continue;
                }
                let hole_count = hole.verts.len();
                for vi1 in (0..hole_count).map(|i| (i + hole_count - 1) % hole_count) {
                    let hv1 = hole.verts[vi1];
                    let diff = hv1 - cv1;
                    let dist_sq = diff.length_squared();
                    if best_dist != MAX_BRIDGE_LENGTH && dist_sq >= best_dist.pow(2) {
                        continue;
                    }
                    if dist_sq > 0 {
                        let diff_2d = diff.truncate();
                        if !accepts(c_in0.dot(diff_2d) > 0, c_in1.dot(diff_2d) > 0) {
                            continue;
                        }
                        let hv0 = hole.verts[(vi1 + hole_count - 1) % hole_count];
                        let hv2 = hole.verts[(vi1 + 1) % hole_count];
                        let h_in0 = inward(hv0, hv1);
                        let h_in1 = inward(hv1, hv2);
                        if !accepts(h_in0.dot(diff_2d) > 0, h_in1.dot(diff_2d) > 0) {
                            continue;
                        }
                        if diff.z.abs() > agent_height {
                            continue;
                        }
                    }
                    best_dist = (dist_sq as f32).sqrt().ceil() as i32;
                    best_hole = hi;
                    best_hole_vertex = vi1;
                    best_contour = ci1;
                }
            }
        }

        let hole = holes.swap_remove(best_hole);
        let outline: Vec<IVec3> = contour.iter().map(|v| v.pos).collect();
        let valid = best_dist != MAX_BRIDGE_LENGTH
            && self.bridge_is_clear(&outline, best_contour, &hole.verts, best_hole_vertex);
        if !valid {
            tracing::warn!(
                "Hole merge connects possibly invalid vertices {} and {}",
                contour[best_contour].pos,
                hole.verts[best_hole_vertex]
            );
        }
        splice_hole(contour, best_contour, &hole.verts, best_hole_vertex, best_dist);
    }

    /// Checks that the bridge between the outline and hole vertex crosses no other edge within reach of its height.
    fn bridge_is_clear(
        &self,
        outline: &[IVec3],
        contour_vertex: usize,
        hole: &[IVec3],
        hole_vertex: usize,
    ) -> bool {
        let agent_height = self.agent_height as i32;
        let cv = outline[contour_vertex];
        let hv = hole[hole_vertex];
        let height_min = cv.z.min(hv.z) - agent_height;
        let height_range = cv.z.max(hv.z) - height_min + agent_height;

        let crosses = |ring: &[IVec3], skip: usize| {
            let count = ring.len();
            (0..count).any(|j| {
                let i = (j + count - 1) % count;
                if i == skip || j == skip {
                    return false;
                }
                let z0 = ring[i].z - height_min;
                let z1 = ring[j].z - height_min;
                if (z0 > height_range && z1 > height_range) || (z0 < 0 && z1 < 0) {
                    return false;
                }
                segments_touch(hv.truncate(), cv.truncate(), ring[i].truncate(), ring[j].truncate())
            })
        };
        !crosses(outline, contour_vertex) && !crosses(hole, hole_vertex)
    }

    fn clip_ears(&self, contour: &mut [PolygonVertex], paint: &PaintData, mesh: &mut GeneratedMesh) -> usize {
        let mut clipper = EarClipper {
            indices: (0..contour.len()).collect(),
            vertices: contour,
            agent_height: self.agent_height as i32,
        };
        for at in 0..clipper.indices.len() {
            clipper.classify(at);
        }

        let offset = IVec3::new(
            self.border_h as i32,
            self.border_h as i32,
            self.border_v as i32,
        );
        let mut added = 0;
        while clipper.indices.len() >= 3 {
            let Some(at) = clipper.best_ear() else {
                tracing::warn!(
                    "Ear clipping got stuck with {} vertices left",
                    clipper.indices.len()
                );
                break;
            };
            let [a, b, c] = clipper
                .corner(at)
                .map(|v| mesh.insert_vertex((v - offset).as_vec3() * self.voxel_size));
            clipper.clip(at);
            let (Some(a), Some(b), Some(c)) = (a, b, c) else {
                break;
            };
            if a == b || b == c || a == c {
                continue;
            }
            if mesh.push_triangle([a, c, b], paint.area).is_none() {
                break;
            }
            added += 1;
        }
        added
    }
}

/// Splices `hole` into `contour` after `contour_vertex`, walking the hole backwards from `hole_vertex`.
///
/// A bridge of length zero joins the two rings at a shared point. Otherwise both bridge ends are duplicated.
fn splice_hole(
    contour: &mut Vec<PolygonVertex>,
    contour_vertex: usize,
    hole: &[IVec3],
    hole_vertex: usize,
    bridge_length: i32,
) {
    let count = hole.len();
    let start = if bridge_length == 0 {
        hole_vertex + count - 1
    } else {
        hole_vertex
    };
    let mut inserted: Vec<PolygonVertex> = (0..count)
        .map(|k| PolygonVertex::from(hole[(start + count - k) % count]))
        .collect();
    if bridge_length != 0 {
        inserted.push(PolygonVertex::from(hole[hole_vertex]));
        inserted.push(contour[contour_vertex]);
    }
    let at = contour_vertex + 1;
    contour.splice(at..at, inserted);
}

#[cfg(test)]
mod tests {
    use crate::{area::AreaAnnotation, config::MarkupId};

    use super::*;

    fn ring(points: &[(i32, i32)]) -> Vec<IVec3> {
        points.iter().map(|&(x, y)| IVec3::new(x, y, 2)).collect()
    }

    fn triangulation<'a>(palette: &'a [PaintData], markups: &'a [MarkupVolume]) -> Triangulation<'a> {
        Triangulation {
            agent_height: 4,
            border_h: 0,
            border_v: 0,
            voxel_size: Vec3::ONE,
            palette,
            markups,
        }
    }

    fn area_2d(mesh: &GeneratedMesh) -> f32 {
        mesh.triangles()
            .iter()
            .map(|triangle| {
                let [a, b, c] = triangle.vertices.map(|i| mesh.vertices()[i as usize]);
                (b - a).truncate().perp_dot((c - a).truncate()).abs() * 0.5
            })
            .sum()
    }

    #[track_caller]
    fn assert_counter_clockwise(mesh: &GeneratedMesh) {
        for triangle in mesh.triangles() {
            let [a, b, c] = triangle.vertices.map(|i| mesh.vertices()[i as usize]);
            let winding = (b - a).truncate().perp_dot((c - a).truncate());
            assert!(winding > 0.0, "{triangle:?} winds the wrong way");
        }
    }

    const DEFAULT: PaintData = PaintData {
        area: AreaAnnotation(1),
        markup: None,
    };

    #[test]
    fn reflex_corners_turn_left() {
        let a = IVec3::new(0, 0, 0);
        assert!(!is_reflex(a, IVec3::new(0, 4, 0), IVec3::new(4, 4, 0)));
        assert!(is_reflex(a, IVec3::new(0, 4, 0), IVec3::new(-4, 4, 0)));
    }

    #[test]
    fn bridge_test_includes_endpoints() {
        let a0 = IVec2::new(0, 0);
        let a1 = IVec2::new(4, 0);
        assert!(segments_touch(a0, a1, IVec2::new(4, 0), IVec2::new(4, 4)));
        assert!(segments_touch(a0, a1, IVec2::new(2, -2), IVec2::new(2, 2)));
        assert!(!segments_touch(a0, a1, IVec2::new(5, -2), IVec2::new(5, 2)));
        assert!(!segments_touch(a0, a1, IVec2::new(0, 1), IVec2::new(4, 1)));
    }

    #[test]
    fn square_becomes_two_triangles() {
        let palette = [DEFAULT];
        let polygon = Polygon {
            contour: ring(&[(0, 0), (0, 6), (6, 6), (6, 0)]),
            holes: vec![],
            paint: OK_PAINT_START,
        };
        let mut mesh = GeneratedMesh::default();
        let mut metadata = TileMetaData::default();
        let added = triangulation(&palette, &[]).triangulate(&[polygon], &mut mesh, &mut metadata);
        assert_eq!(added, 2);
        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(area_2d(&mesh), 36.0);
        assert_counter_clockwise(&mesh);
        assert!(mesh.triangles().iter().all(|t| t.area == AreaAnnotation(1)));
        assert!(metadata.markup_triangles.is_empty());
    }

    #[test]
    fn concave_outline_keeps_its_area() {
        let palette = [DEFAULT];
        // An L shape.
        let polygon = Polygon {
            contour: ring(&[(0, 0), (0, 8), (4, 8), (4, 4), (8, 4), (8, 0)]),
            holes: vec![],
            paint: OK_PAINT_START,
        };
        let mut mesh = GeneratedMesh::default();
        let added = triangulation(&palette, &[]).triangulate(
            &[polygon],
            &mut mesh,
            &mut TileMetaData::default(),
        );
        assert_eq!(added, 4);
        assert_eq!(area_2d(&mesh), 48.0);
        assert_counter_clockwise(&mesh);
    }

    #[test]
    fn holes_are_cut_out() {
        let palette = [DEFAULT];
        // Holes are traced clockwise around the hole itself.
        let hole = ring(&[(4, 4), (4, 8), (8, 8), (8, 4)]);
        let polygon = Polygon {
            contour: ring(&[(0, 0), (0, 12), (12, 12), (12, 0)]),
            holes: vec![Hole {
                verts: hole,
                center: IVec2::new(6, 6),
                radius: 3,
            }],
            paint: OK_PAINT_START,
        };
        let mut mesh = GeneratedMesh::default();
        triangulation(&palette, &[]).triangulate(&[polygon], &mut mesh, &mut TileMetaData::default());
        assert_eq!(area_2d(&mesh), 144.0 - 16.0);
        assert_counter_clockwise(&mesh);
    }

    #[test]
    fn markup_triangles_are_recorded() {
        let markups = [MarkupVolume {
            id: MarkupId(7),
            store_triangles: true,
            ..Default::default()
        }];
        let palette = [
            DEFAULT,
            PaintData {
                area: AreaAnnotation(3),
                markup: Some(0),
            },
        ];
        let polygons = [
            Polygon {
                contour: ring(&[(0, 0), (0, 4), (4, 4), (4, 0)]),
                holes: vec![],
                paint: OK_PAINT_START,
            },
            Polygon {
                contour: ring(&[(4, 0), (4, 4), (8, 4), (8, 0)]),
                holes: vec![],
                paint: OK_PAINT_START + 1,
            },
        ];
        let mut mesh = GeneratedMesh::default();
        let mut metadata = TileMetaData::default();
        triangulation(&palette, &markups).triangulate(&polygons, &mut mesh, &mut metadata);
        assert_eq!(metadata.markup_triangles[&MarkupId(7)], [2, 3]);
        assert_eq!(mesh.triangles()[2].area, AreaAnnotation(3));
    }

    #[test]
    fn equally_close_bridges_pick_the_last_candidate() {
        let palette = [DEFAULT];
        let mut contour: Vec<PolygonVertex> = ring(&[(0, 0), (0, 12), (12, 12), (12, 0)])
            .into_iter()
            .map(PolygonVertex::from)
            .collect();
        let mut holes = vec![Hole {
            verts: ring(&[(4, 4), (4, 8), (8, 8), (8, 4)]),
            center: IVec2::new(6, 6),
            radius: 3,
        }];
        triangulation(&palette, &[]).merge_closest_hole(&mut contour, &mut holes);
        assert!(holes.is_empty());
        let positions: Vec<_> = contour.iter().map(|v| (v.pos.x, v.pos.y)).collect();
        assert_eq!(
            positions,
            [
                (0, 0),
                (0, 12),
                (12, 12),
                (8, 8),
                (4, 8),
                (4, 4),
                (8, 4),
                (8, 8),
                (12, 12),
                (12, 0)
            ]
        );
    }

    #[test]
    fn splicing_a_hole_duplicates_the_bridge() {
        let mut contour: Vec<PolygonVertex> = ring(&[(0, 0), (0, 12), (12, 12), (12, 0)])
            .into_iter()
            .map(PolygonVertex::from)
            .collect();
        let hole = ring(&[(4, 4), (4, 8), (8, 8), (8, 4)]);
        splice_hole(&mut contour, 0, &hole, 0, 6);
        let positions: Vec<_> = contour.iter().map(|v| (v.pos.x, v.pos.y)).collect();
        assert_eq!(
            positions,
            [
                (0, 0),
                (4, 4),
                (8, 4),
                (8, 8),
                (4, 8),
                (4, 4),
                (0, 0),
                (0, 12),
                (12, 12),
                (12, 0)
            ]
        );
    }
}
