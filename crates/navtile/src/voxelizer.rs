//! Rasterizes world geometry into a [`DynamicSpanGrid`].
//!
//! World geometry is reached through a [`GeometrySource`]. The voxelizer hashes everything it is
//! handed before rasterizing, so an unchanged input can be detected without doing any voxel work.

use glam::{Affine3A, Vec2, Vec3, Vec3Swizzles as _};

use crate::{
    hash::HashComputer,
    math::{Aabb3d, TriangleVertices as _},
    span::{SpanBuilder, SpanFlags},
    span_grid::{DynamicSpanGrid, SpanGridBuilder, SpanGridError, SpanInsertion, SpanInsertionError},
    trimesh::TriMesh,
};

/// One mesh placed in the world.
#[derive(Debug, Clone, Copy)]
pub struct GeometryInstance<'a> {
    /// The mesh in its local space.
    pub mesh: &'a TriMesh,
    /// Local to world transform.
    pub transform: Affine3A,
}

/// Provides the world geometry a tile is generated from.
pub trait GeometrySource {
    /// Calls `visitor` for every mesh that may overlap `aabb`.
    ///
    /// Instances must be visited in a deterministic order, since their order feeds the content hash.
    fn visit_geometry(&self, aabb: &Aabb3d, visitor: &mut dyn FnMut(GeometryInstance<'_>));

    /// The height of the water surface above `point`, if there is any water.
    fn water_level(&self, _point: Vec2) -> Option<f32> {
        None
    }
}

impl GeometrySource for TriMesh {
    fn visit_geometry(&self, aabb: &Aabb3d, visitor: &mut dyn FnMut(GeometryInstance<'_>)) {
        if self
            .compute_aabb()
            .is_some_and(|mesh_aabb| mesh_aabb.overlaps(aabb))
        {
            visitor(GeometryInstance {
                mesh: self,
                transform: Affine3A::IDENTITY,
            });
        }
    }
}

/// A static collection of placed meshes with an optional global water plane.
#[derive(Debug, Clone, Default)]
pub struct GeometryScene {
    /// The placed meshes, visited in order.
    pub instances: Vec<(TriMesh, Affine3A)>,
    /// Height of a water plane covering the whole scene.
    pub water_level: Option<f32>,
}

impl GeometryScene {
    /// Adds a mesh at the given placement.
    pub fn with_mesh(mut self, mesh: TriMesh, transform: Affine3A) -> Self {
        self.instances.push((mesh, transform));
        self
    }
}

impl GeometrySource for GeometryScene {
    fn visit_geometry(&self, aabb: &Aabb3d, visitor: &mut dyn FnMut(GeometryInstance<'_>)) {
        for (mesh, transform) in &self.instances {
            let Some(local) = mesh.compute_aabb() else {
                continue;
            };
            let mut world = Aabb3d::EMPTY;
            for x in [local.min.x, local.max.x] {
                for y in [local.min.y, local.max.y] {
                    for z in [local.min.z, local.max.z] {
                        world.grow(transform.transform_point3(Vec3::new(x, y, z)));
                    }
                }
            }
            if world.overlaps(aabb) {
                visitor(GeometryInstance {
                    mesh,
                    transform: *transform,
                });
            }
        }
    }

    fn water_level(&self, _point: Vec2) -> Option<f32> {
        self.water_level
    }
}

/// The result of [`WorldVoxelizer::process_geometry`].
#[derive(Debug)]
pub struct Voxelization {
    /// The content hash, seeded by the caller and extended by all visited geometry.
    pub hash: u32,
    /// The number of triangles overlapping the voxelized box.
    pub triangle_count: usize,
    /// `true` if rasterization was skipped because the hash matched the caller's previous hash.
    pub unchanged: bool,
}

/// Rasterizes the geometry of a [`GeometrySource`] into solid spans.
#[derive(Debug)]
pub struct WorldVoxelizer {
    grid: DynamicSpanGrid,
    triangles: Vec<([Vec3; 3], SpanFlags)>,
}

impl WorldVoxelizer {
    /// Prepares a voxelizer covering `aabb`.
    pub fn new(aabb: Aabb3d, voxel_size: Vec3) -> Result<Self, SpanGridError> {
        Ok(Self {
            grid: SpanGridBuilder { aabb, voxel_size }.build()?,
            triangles: Vec::new(),
        })
    }

    /// The span grid built so far.
    #[inline]
    pub fn span_grid(&self) -> &DynamicSpanGrid {
        &self.grid
    }

    /// Hashes and rasterizes all geometry overlapping the voxelizer's box.
    ///
    /// `seed` starts the content hash. If `previous_hash` equals the resulting hash, nothing is rasterized.
    pub fn process_geometry(
        &mut self,
        source: &dyn GeometrySource,
        seed: u32,
        previous_hash: Option<u32>,
    ) -> Voxelization {
        let aabb = self.grid.aabb;
        let mut hasher = HashComputer::new(seed);
        self.triangles.clear();
        let triangles = &mut self.triangles;
        source.visit_geometry(&aabb, &mut |instance| {
            hasher.add_affine(&instance.transform);
            for index in 0..instance.mesh.indices.len() {
                let triangle = instance.mesh.triangle(index, &instance.transform);
                if !triangle.aabb().overlaps(&aabb) {
                    continue;
                }
                for vertex in triangle {
                    hasher.add_vec3(vertex);
                }
                let flags = if triangle.normal().z < 0.0 {
                    SpanFlags::BACKFACE
                } else {
                    SpanFlags::empty()
                };
                triangles.push((triangle, flags));
            }
        });
        hasher.complete();
        let hash = hasher.value();
        let triangle_count = self.triangles.len();

        if previous_hash == Some(hash) {
            tracing::trace!("Geometry hash {hash:#010x} unchanged, skipping rasterization");
            return Voxelization {
                hash,
                triangle_count,
                unchanged: true,
            };
        }

        let triangles = std::mem::take(&mut self.triangles);
        for (triangle, flags) in &triangles {
            if let Err(err) = self.rasterize_triangle(triangle, *flags) {
                // Clamping keeps insertions in bounds, so this only fires on a broken grid.
                tracing::error!("Failed to rasterize triangle: {err}");
            }
        }
        self.triangles = triangles;
        self.calculate_water_depth(source);

        Voxelization {
            hash,
            triangle_count,
            unchanged: false,
        }
    }

    /// Clips the triangle against every grid cell it touches and adds a span per cell.
    fn rasterize_triangle(
        &mut self,
        triangle: &[Vec3; 3],
        flags: SpanFlags,
    ) -> Result<(), SpanInsertionError> {
        let grid_aabb = self.grid.aabb;
        let triangle_aabb = triangle.aabb();
        if !triangle_aabb.overlaps(&grid_aabb) {
            return Ok(());
        }
        let inverse = self.grid.voxel_size.recip();
        let width = self.grid.width as i32;
        let height = self.grid.height as i32;
        let layers = ((grid_aabb.max.z - grid_aabb.min.z) * inverse.z).round() as i32;

        let y0 = (((triangle_aabb.min.y - grid_aabb.min.y) * inverse.y).floor() as i32)
            .clamp(-1, height - 1);
        let y1 = (((triangle_aabb.max.y - grid_aabb.min.y) * inverse.y).floor() as i32)
            .clamp(0, height - 1);

        let mut remaining = triangle.to_vec();
        let mut row = Vec::with_capacity(7);
        let mut rest = Vec::with_capacity(7);
        let mut cell = Vec::with_capacity(7);
        let mut row_rest = Vec::with_capacity(7);
        for y in y0..=y1 {
            let row_max = grid_aabb.min.y + (y + 1) as f32 * self.grid.voxel_size.y;
            divide_poly(&remaining, &mut row, &mut rest, row_max, Axis::Y);
            std::mem::swap(&mut remaining, &mut rest);
            if row.len() < 3 || y < 0 {
                continue;
            }

            let (min_x, max_x) = row
                .iter()
                .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v.x), max.max(v.x)));
            let x0 = ((min_x - grid_aabb.min.x) * inverse.x).floor() as i32;
            let x1 = ((max_x - grid_aabb.min.x) * inverse.x).floor() as i32;
            if x1 < 0 || x0 >= width {
                continue;
            }
            let x0 = x0.clamp(-1, width - 1);
            let x1 = x1.clamp(0, width - 1);

            for x in x0..=x1 {
                let column_max = grid_aabb.min.x + (x + 1) as f32 * self.grid.voxel_size.x;
                divide_poly(&row, &mut cell, &mut row_rest, column_max, Axis::X);
                std::mem::swap(&mut row, &mut row_rest);
                if cell.len() < 3 || x < 0 {
                    continue;
                }

                let (min_z, max_z) = cell
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(min, max), v| (min.min(v.z), max.max(v.z)));
                // Surfaces on a layer boundary belong to the layer below it.
                let span_min =
                    ((min_z - grid_aabb.min.z) * inverse.z + LAYER_SNAP).floor() as i32;
                let span_max = ((max_z - grid_aabb.min.z) * inverse.z - LAYER_SNAP).ceil() as i32;
                if span_max < 0 || span_min > layers {
                    continue;
                }
                let span_max = span_max.clamp(1, layers.max(1));
                let span_min = span_min.clamp(0, span_max - 1);

                self.grid.add_span(SpanInsertion {
                    x: x as u16,
                    y: y as u16,
                    span: SpanBuilder {
                        min: span_min as u16,
                        max: span_max as u16,
                        flags,
                        next: None,
                    }
                    .build(),
                })?;
            }
        }
        Ok(())
    }

    /// Stores how deep below the water surface the top of each span lies.
    fn calculate_water_depth(&mut self, source: &dyn GeometrySource) {
        let aabb = self.grid.aabb;
        let voxel_size = self.grid.voxel_size;
        for y in 0..self.grid.height {
            for x in 0..self.grid.width {
                let center = aabb.min.xy() + (Vec2::new(x as f32, y as f32) + 0.5) * voxel_size.xy();
                let Some(level) = source.water_level(center) else {
                    continue;
                };
                let keys: Vec<_> = self.grid.column(x, y).map(|(key, _)| key).collect();
                for key in keys {
                    let span = self.grid.span_mut(key);
                    let top = aabb.min.z + span.max() as f32 * voxel_size.z;
                    let depth = ((level - top).max(0.0) / voxel_size.z).ceil();
                    span.set_depth(depth.min(u16::MAX as f32) as u16);
                }
            }
        }
    }
}

/// Distance in layers within which a height counts as lying on the layer boundary.
const LAYER_SNAP: f32 = 1.0e-3;

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Splits a convex polygon by an axis-aligned line into the parts below and above `offset`.
fn divide_poly(
    input: &[Vec3],
    below: &mut Vec<Vec3>,
    above: &mut Vec<Vec3>,
    offset: f32,
    axis: Axis,
) {
    below.clear();
    above.clear();
    let coord = |v: &Vec3| match axis {
        Axis::X => v.x,
        Axis::Y => v.y,
    };
    let count = input.len();
    for i in 0..count {
        let a = input[i];
        let b = input[(i + 1) % count];
        let da = offset - coord(&a);
        let db = offset - coord(&b);
        if da >= 0.0 {
            below.push(a);
        }
        if da <= 0.0 {
            above.push(a);
        }
        if (da > 0.0 && db < 0.0) || (da < 0.0 && db > 0.0) {
            let t = da / (da - db);
            let intersection = a + (b - a) * t;
            below.push(intersection);
            above.push(intersection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voxelizer() -> WorldVoxelizer {
        WorldVoxelizer::new(Aabb3d::new(Vec3::ZERO, Vec3::new(4.0, 4.0, 4.0)), Vec3::ONE).unwrap()
    }

    fn column(voxelizer: &WorldVoxelizer, x: u16, y: u16) -> Vec<(u16, u16, SpanFlags, u16)> {
        voxelizer
            .span_grid()
            .column(x, y)
            .map(|(_, span)| (span.min(), span.max(), span.flags(), span.depth()))
            .collect()
    }

    #[test]
    fn splits_polygon_along_axis() {
        let mut below = Vec::new();
        let mut above = Vec::new();
        let square = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        divide_poly(&square, &mut below, &mut above, 1.0, Axis::X);
        assert_eq!(below.len(), 4);
        assert_eq!(above.len(), 4);
        assert!(below.iter().all(|v| v.x <= 1.0));
        assert!(above.iter().all(|v| v.x >= 1.0));
    }

    #[test]
    fn flat_quad_covers_every_column() {
        let mut voxelizer = voxelizer();
        let mesh = TriMesh::from_quad(Vec3::new(-1.0, -1.0, 1.5), Vec3::new(5.0, 5.0, 1.5));
        let result = voxelizer.process_geometry(&mesh, 0, None);
        assert_eq!(result.triangle_count, 2);
        assert!(!result.unchanged);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(column(&voxelizer, x, y), vec![(1, 2, SpanFlags::empty(), 0)]);
            }
        }
    }

    #[test]
    fn surfaces_on_a_layer_boundary_end_there() {
        let mut quad = voxelizer();
        let mesh = TriMesh::from_quad(Vec3::new(-1.0, -1.0, 2.0), Vec3::new(5.0, 5.0, 2.0));
        quad.process_geometry(&mesh, 0, None);
        assert_eq!(column(&quad, 2, 2), vec![(1, 2, SpanFlags::empty(), 0)]);

        let mut slab = voxelizer();
        let mesh = TriMesh::from_box(Vec3::new(-1.0, -1.0, 1.0), Vec3::new(5.0, 5.0, 2.0));
        slab.process_geometry(&mesh, 0, None);
        let spans = column(&slab, 2, 2);
        assert_eq!(spans.first().map(|span| span.0), Some(0));
        assert_eq!(spans.last().map(|span| span.1), Some(2));
    }

    #[test]
    fn downward_faces_are_backfaces() {
        let mut voxelizer = voxelizer();
        let mesh = TriMesh::from_box(Vec3::new(-1.0, -1.0, 0.5), Vec3::new(5.0, 5.0, 2.5));
        voxelizer.process_geometry(&mesh, 0, None);
        let spans = column(&voxelizer, 2, 2);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].2, SpanFlags::BACKFACE);
        assert_eq!(spans[1].2, SpanFlags::empty());
    }

    #[test]
    fn unchanged_hash_skips_rasterization() {
        let mesh = TriMesh::from_quad(Vec3::new(0.0, 0.0, 1.5), Vec3::new(4.0, 4.0, 1.5));
        let first = voxelizer().process_geometry(&mesh, 7, None);
        let mut second_voxelizer = voxelizer();
        let second = second_voxelizer.process_geometry(&mesh, 7, Some(first.hash));
        assert_eq!(first.hash, second.hash);
        assert!(second.unchanged);
        assert_eq!(second_voxelizer.span_grid().span_count(), 0);
    }

    #[test]
    fn geometry_outside_the_box_is_ignored() {
        let mesh = TriMesh::from_quad(Vec3::new(10.0, 10.0, 1.5), Vec3::new(12.0, 12.0, 1.5));
        let seeded = voxelizer().process_geometry(&TriMesh::default(), 3, None);
        let result = voxelizer().process_geometry(&mesh, 3, None);
        assert_eq!(result.triangle_count, 0);
        assert_eq!(result.hash, seeded.hash);
    }

    #[test]
    fn water_depth_is_measured_from_span_top() {
        let mut voxelizer = voxelizer();
        let scene = GeometryScene {
            water_level: Some(3.5),
            ..Default::default()
        }
        .with_mesh(
            TriMesh::from_quad(Vec3::new(0.0, 0.0, 1.5), Vec3::new(4.0, 4.0, 1.5)),
            Affine3A::IDENTITY,
        );
        voxelizer.process_geometry(&scene, 0, None);
        // Top at 2.0, water at 3.5
        assert_eq!(column(&voxelizer, 1, 1), vec![(1, 2, SpanFlags::empty(), 2)]);
    }
}
