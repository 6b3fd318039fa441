//! Extruded 2D polygons used as the tile boundary, exclusion zones and area markups.

use glam::{Vec2, Vec3, Vec3Swizzles as _};

use crate::math::Aabb3d;

/// How much of a box lies inside a [`BoundingVolume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Overlap {
    /// The box and the volume do not touch.
    None,
    /// Some of the box lies inside the volume.
    Partial,
    /// The whole box lies inside the volume.
    Full,
}

/// A closed polygon on the xy-plane, extruded upwards by `height`.
///
/// The vertical extent of the volume reaches from the lowest vertex to `height` above the highest vertex.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingVolume {
    vertices: Vec<Vec3>,
    aabb: Aabb3d,
    height: f32,
}

impl BoundingVolume {
    /// Creates a volume from its polygon loop and extrusion height.
    pub fn new(vertices: impl Into<Vec<Vec3>>, height: f32) -> Self {
        let mut volume = Self::default();
        volume.set(vertices, height);
        volume
    }

    /// Replaces the polygon loop and rebuilds the cached bounding box.
    pub fn set(&mut self, vertices: impl Into<Vec<Vec3>>, height: f32) {
        self.vertices = vertices.into();
        self.height = height;
        self.aabb = match Aabb3d::from_verts(&self.vertices) {
            Some(mut aabb) => {
                aabb.max.z += height;
                aabb
            }
            None => Aabb3d::default(),
        };
    }

    /// The polygon loop.
    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// The cached bounding box, including the extrusion.
    #[inline]
    pub fn aabb(&self) -> &Aabb3d {
        &self.aabb
    }

    /// The extrusion height.
    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Returns `true` if the volume has no vertices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Moves the volume by `delta`.
    pub fn offset(&mut self, delta: Vec3) {
        for vertex in &mut self.vertices {
            *vertex += delta;
        }
        self.aabb = self.aabb.translated(delta);
    }

    /// Iterates over the polygon edges as `(start, end)` pairs on the xy-plane.
    fn edges_2d(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        let count = self.vertices.len();
        (0..count).map(move |i| {
            let j = if i == 0 { count - 1 } else { i - 1 };
            (self.vertices[j].xy(), self.vertices[i].xy())
        })
    }

    /// Even-odd point in polygon test on the xy-plane, guarded by the volume's box.
    pub fn contains_point(&self, point: Vec3) -> bool {
        if self.vertices.is_empty() || !self.aabb.contains_point(point) {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.edges_2d() {
            if (a.y > point.y) != (b.y > point.y)
                && point.x < (a.x - b.x) * (point.y - b.y) / (a.y - b.y) + b.x
            {
                inside = !inside;
            }
        }
        inside
    }

    /// Checks whether the segment `a..b` touches the volume on the xy-plane.
    pub fn overlaps_segment(&self, a: Vec2, b: Vec2) -> bool {
        if self.vertices.is_empty() {
            return false;
        }
        let z = self.aabb.min.z;
        if self.contains_point(a.extend(z)) || self.contains_point(b.extend(z)) {
            return true;
        }
        self.edges_2d()
            .any(|(c, d)| segments_intersect_2d(a, b, c, d))
    }

    /// Checks whether any part of `aabb` lies inside the volume.
    pub fn overlaps(&self, aabb: &Aabb3d) -> bool {
        if self.vertices.is_empty() || !self.aabb.overlaps(aabb) {
            return false;
        }
        let min = aabb.min.xy();
        let max = aabb.max.xy();
        if self
            .vertices
            .iter()
            .any(|v| v.x >= min.x && v.x <= max.x && v.y >= min.y && v.y <= max.y)
        {
            return true;
        }

        let mid_z = aabb.center().z.clamp(self.aabb.min.z, self.aabb.max.z);
        let probes = [
            Vec3::new(min.x, min.y, mid_z),
            Vec3::new(max.x, min.y, mid_z),
            Vec3::new(max.x, max.y, mid_z),
            Vec3::new(min.x, max.y, mid_z),
        ];
        if probes.into_iter().any(|probe| self.contains_point(probe)) {
            return true;
        }

        self.edges_2d()
            .any(|(a, b)| segment_intersects_rect_2d(a, b, min, max))
    }

    /// Classifies how much of `aabb` lies inside the volume.
    ///
    /// All eight corners of the box must be inside, and no polygon edge may cross the box,
    /// for the box to count as fully contained.
    pub fn contains(&self, aabb: &Aabb3d) -> Overlap {
        if self.vertices.is_empty() || !self.aabb.overlaps(aabb) {
            return Overlap::None;
        }
        let corners = [
            Vec3::new(aabb.min.x, aabb.min.y, aabb.min.z),
            Vec3::new(aabb.max.x, aabb.min.y, aabb.min.z),
            Vec3::new(aabb.max.x, aabb.max.y, aabb.min.z),
            Vec3::new(aabb.min.x, aabb.max.y, aabb.min.z),
            Vec3::new(aabb.min.x, aabb.min.y, aabb.max.z),
            Vec3::new(aabb.max.x, aabb.min.y, aabb.max.z),
            Vec3::new(aabb.max.x, aabb.max.y, aabb.max.z),
            Vec3::new(aabb.min.x, aabb.max.y, aabb.max.z),
        ];
        let inside = corners
            .into_iter()
            .filter(|corner| self.contains_point(*corner))
            .count();

        if inside == corners.len() {
            let min = aabb.min.xy();
            let max = aabb.max.xy();
            if self
                .edges_2d()
                .any(|(a, b)| segment_intersects_rect_2d(a, b, min, max))
            {
                return Overlap::Partial;
            }
            return Overlap::Full;
        }
        if inside > 0 || self.overlaps(aabb) {
            Overlap::Partial
        } else {
            Overlap::None
        }
    }
}

#[inline]
fn cross_2d(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b - a).perp_dot(c - a)
}

/// Closed segment intersection test, touching counts.
fn segments_intersect_2d(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> bool {
    let d0 = cross_2d(a0, a1, b0);
    let d1 = cross_2d(a0, a1, b1);
    let d2 = cross_2d(b0, b1, a0);
    let d3 = cross_2d(b0, b1, a1);
    if ((d0 > 0.0 && d1 < 0.0) || (d0 < 0.0 && d1 > 0.0))
        && ((d2 > 0.0 && d3 < 0.0) || (d2 < 0.0 && d3 > 0.0))
    {
        return true;
    }
    let on_segment = |p: Vec2, q: Vec2, r: Vec2| {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    };
    (d0 == 0.0 && on_segment(a0, a1, b0))
        || (d1 == 0.0 && on_segment(a0, a1, b1))
        || (d2 == 0.0 && on_segment(b0, b1, a0))
        || (d3 == 0.0 && on_segment(b0, b1, a1))
}

/// Liang-Barsky clip of the segment `a..b` against the rectangle `min..max`.
fn segment_intersects_rect_2d(a: Vec2, b: Vec2, min: Vec2, max: Vec2) -> bool {
    let delta = b - a;
    let mut t0 = 0.0_f32;
    let mut t1 = 1.0_f32;
    for (p, q) in [
        (-delta.x, a.x - min.x),
        (delta.x, max.x - a.x),
        (-delta.y, a.y - min.y),
        (delta.y, max.y - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn unit_square_contains_its_center() {
        let volume = BoundingVolume::new(unit_square(), 1.0);
        assert!(volume.contains_point(Vec3::new(0.5, 0.5, 0.5)));
        assert!(!volume.contains_point(Vec3::new(1.5, 0.5, 0.5)));
    }

    #[test]
    fn containment_is_invariant_under_rotation_and_reversal() {
        let probes = [
            Vec3::new(0.5, 0.5, 0.2),
            Vec3::new(0.1, 0.9, 0.2),
            Vec3::new(1.5, 0.5, 0.2),
            Vec3::new(-0.1, 0.5, 0.2),
        ];
        let base = BoundingVolume::new(unit_square(), 1.0);
        for rotation in 0..4 {
            let mut vertices = unit_square();
            vertices.rotate_left(rotation);
            let rotated = BoundingVolume::new(vertices.clone(), 1.0);
            vertices.reverse();
            let reversed = BoundingVolume::new(vertices, 1.0);
            for probe in probes {
                assert_eq!(rotated.contains_point(probe), base.contains_point(probe));
                assert_eq!(reversed.contains_point(probe), base.contains_point(probe));
            }
        }
    }

    #[test]
    fn points_outside_height_range_are_not_contained() {
        let volume = BoundingVolume::new(unit_square(), 1.0);
        assert!(!volume.contains_point(Vec3::new(0.5, 0.5, 1.5)));
        assert!(!volume.contains_point(Vec3::new(0.5, 0.5, -0.5)));
    }

    #[test]
    fn empty_volume_contains_nothing() {
        let volume = BoundingVolume::default();
        let aabb = Aabb3d::new(Vec3::ZERO, Vec3::ONE);
        assert!(!volume.contains_point(Vec3::ZERO));
        assert!(!volume.overlaps(&aabb));
        assert_eq!(volume.contains(&aabb), Overlap::None);
    }

    #[test]
    fn classifies_box_containment() {
        let volume = BoundingVolume::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
            10.0,
        );
        let inside = Aabb3d::new(Vec3::splat(2.0), Vec3::splat(4.0));
        let straddling = Aabb3d::new(Vec3::new(8.0, 2.0, 2.0), Vec3::new(12.0, 4.0, 4.0));
        let outside = Aabb3d::new(Vec3::splat(20.0), Vec3::splat(30.0));
        assert_eq!(volume.contains(&inside), Overlap::Full);
        assert_eq!(volume.contains(&straddling), Overlap::Partial);
        assert_eq!(volume.contains(&outside), Overlap::None);
    }

    #[test]
    fn concave_notch_prevents_full_containment() {
        // A U shape whose notch cuts into the box without covering any corner.
        let volume = BoundingVolume::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 0.0),
                Vec3::new(5.5, 10.0, 0.0),
                Vec3::new(5.5, 5.0, 0.0),
                Vec3::new(4.5, 5.0, 0.0),
                Vec3::new(4.5, 10.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
            10.0,
        );
        let aabb = Aabb3d::new(Vec3::new(2.0, 2.0, 1.0), Vec3::new(8.0, 8.0, 2.0));
        assert_eq!(volume.contains(&aabb), Overlap::Partial);
    }

    #[test]
    fn polygon_inside_box_overlaps() {
        let mut volume = BoundingVolume::new(unit_square(), 1.0);
        volume.offset(Vec3::new(2.0, 2.0, 0.0));
        let aabb = Aabb3d::new(Vec3::new(0.0, 0.0, -1.0), Vec3::new(5.0, 5.0, 1.0));
        assert!(volume.overlaps(&aabb));
        assert_eq!(volume.contains(&aabb), Overlap::Partial);
        assert_eq!(volume.aabb().min, Vec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn segment_crossing_the_polygon_overlaps() {
        let volume = BoundingVolume::new(unit_square(), 1.0);
        assert!(volume.overlaps_segment(Vec2::new(-1.0, 0.5), Vec2::new(2.0, 0.5)));
        assert!(!volume.overlaps_segment(Vec2::new(-1.0, 2.0), Vec2::new(2.0, 2.0)));
    }
}
