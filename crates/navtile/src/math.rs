//! Geometry primitives shared by all pipeline stages.

use glam::{IVec2, IVec3, Vec3};

/// An axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb3d {
    /// The minimum corner
    pub min: Vec3,
    /// The maximum corner
    pub max: Vec3,
}

impl Aabb3d {
    /// Creates a box from its two corners.
    #[inline]
    pub fn new(min: impl Into<Vec3>, max: impl Into<Vec3>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// A box that contains nothing. Growing it by any point yields a box around that point.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    /// Computes the AABB of a set of vertices.
    /// Returns `None` if `vertices` is empty.
    pub fn from_verts(vertices: &[Vec3]) -> Option<Self> {
        let mut iter = vertices.iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), point| {
            (point.min(min), point.max(max))
        });
        Some(Self { min, max })
    }

    /// Returns `true` if `min <= max` on every axis.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Grows the box to contain `point`.
    #[inline]
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grows the box to contain `other`.
    #[inline]
    pub fn merge(&mut self, other: &Aabb3d) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Returns a copy of the box grown by `amount` on each side.
    #[inline]
    pub fn expanded(&self, amount: Vec3) -> Self {
        Self {
            min: self.min - amount,
            max: self.max + amount,
        }
    }

    /// Returns a copy of the box moved by `delta`.
    #[inline]
    pub fn translated(&self, delta: Vec3) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Checks whether two boxes overlap. Touching boxes count as overlapping.
    #[inline]
    pub fn overlaps(&self, other: &Aabb3d) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Checks whether `point` lies inside the box, borders included.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Checks whether `other` lies completely inside the box.
    #[inline]
    pub fn contains_aabb(&self, other: &Aabb3d) -> bool {
        other.min.cmpge(self.min).all() && other.max.cmple(self.max).all()
    }

    /// The extent of the box along each axis.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// The center of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The surface area of the box. Used as the cost metric of the BVH builder.
    #[inline]
    pub fn surface_area(&self) -> f32 {
        let size = self.size();
        2.0 * (size.x * size.y + size.x * size.z + size.y * size.z)
    }
}

pub(crate) trait TriangleVertices {
    fn aabb(&self) -> Aabb3d;
    fn normal(&self) -> Vec3;
}

impl TriangleVertices for [Vec3; 3] {
    #[inline]
    fn aabb(&self) -> Aabb3d {
        let min = self[0].min(self[1]).min(self[2]);
        let max = self[0].max(self[1]).max(self[2]);
        Aabb3d { min, max }
    }

    #[inline]
    fn normal(&self) -> Vec3 {
        (self[1] - self[0])
            .cross(self[2] - self[0])
            .normalize_or_zero()
    }
}

/// Neighbour column offsets. The first four are the axis-aligned neighbours in the order
/// the walkability filter evaluates them, followed by the diagonals.
pub(crate) const NEIGHBOUR_OFFSETS: [IVec2; 8] = [
    IVec2::new(0, 1),
    IVec2::new(-1, 0),
    IVec2::new(1, 0),
    IVec2::new(0, -1),
    IVec2::new(-1, -1),
    IVec2::new(1, -1),
    IVec2::new(1, 1),
    IVec2::new(-1, 1),
];

/// Rotates a grid direction by 90 degrees counter-clockwise.
#[inline]
pub(crate) fn rot90_ccw(dir: IVec2) -> IVec2 {
    IVec2::new(-dir.y, dir.x)
}

/// Rotates a grid direction by 90 degrees clockwise.
#[inline]
pub(crate) fn rot90_cw(dir: IVec2) -> IVec2 {
    IVec2::new(dir.y, -dir.x)
}

/// Squared distance between `point` and the segment `a..b`.
pub(crate) fn dist_point_to_segment_sq(point: IVec3, a: IVec3, b: IVec3) -> f32 {
    let p = point.as_vec3();
    let a = a.as_vec3();
    let b = b.as_vec3();
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

/// Squared distance between `point` and the segment `a..b`, ignoring heights.
#[inline]
pub(crate) fn dist_point_to_segment_sq_2d(point: IVec3, a: IVec3, b: IVec3) -> f32 {
    dist_point_to_segment_sq(point.with_z(0), a.with_z(0), b.with_z(0))
}
