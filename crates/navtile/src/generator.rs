//! Drives all stages of a tile build.

use glam::{UVec3, Vec3};
use thiserror::Error;

use crate::{
    border::BorderBand,
    bounding_volume::Overlap,
    bvh::{BvNode, build_bv_tree},
    compact_span_grid::CompactSpanGrid,
    config::{GenerateFlags, TileGeneratorParams},
    contours::{ContourExtraction, Region, filter_bad_regions},
    debug::DebugSnapshot,
    extension::ExtensionParams,
    filter::WalkableFilter,
    hash::HashComputer,
    label::NO_LABEL,
    math::Aabb3d,
    mesh::GeneratedMesh,
    paint::{MarkupData, PaintArea, PaintData, create_paint_palette},
    simplify::{Polygon, simplify_regions},
    span::SpanFlags,
    span_grid::SpanGridError,
    tile::{Tile, TileMetaData},
    triangulate::Triangulation,
    trimesh::TriMesh,
    voxelizer::WorldVoxelizer,
};

/// Seed of the content hash for tiles whose inputs don't depend on any volume.
const FULLY_CONTAINED_SEED: u32 = 0xf007_b00b;

/// Reasons why [`TileGenerator::generate`] did not produce a tile.
#[derive(Error, Debug)]
pub enum GenerateError {
    /// A tile dimension exceeds [`TileGeneratorParams::MAX_TILE_SIZE`].
    #[error("Tile size {size} exceeds the maximum of {max} per axis", max = TileGeneratorParams::MAX_TILE_SIZE)]
    InvalidTileSize {
        /// The requested tile size
        size: UVec3,
    },
    /// A voxel dimension is below [`TileGeneratorParams::MIN_VOXEL_SIZE`].
    #[error("Voxel size {voxel_size} is below the minimum of {min} per axis", min = TileGeneratorParams::MIN_VOXEL_SIZE)]
    InvalidVoxelSize {
        /// The requested voxel size
        voxel_size: Vec3,
    },
    /// The tile doesn't touch the boundary volume.
    #[error("The tile lies outside the boundary volume")]
    OutsideBoundary,
    /// The tile lies completely inside an exclusion volume.
    #[error("The tile lies inside an exclusion volume")]
    FullyExcluded,
    /// The content hash matches the previous one, so the existing tile is still valid.
    #[error("Tile inputs are unchanged (hash {hash:#010x})")]
    Unchanged {
        /// The content hash
        hash: u32,
    },
    /// Generation ran but produced no triangles.
    #[error("Tile generation produced no triangles (hash {hash:#010x})")]
    EmptyMesh {
        /// The content hash
        hash: u32,
    },
    /// The voxel grid for the tile could not be set up.
    #[error(transparent)]
    Voxelization(#[from] SpanGridError),
}

impl GenerateError {
    /// The content hash, if generation got far enough to compute it.
    pub fn hash(&self) -> Option<u32> {
        match self {
            GenerateError::Unchanged { hash } | GenerateError::EmptyMesh { hash } => Some(*hash),
            _ => None,
        }
    }
}

/// Reusable workspace for building navigation mesh tiles.
///
/// One generator builds one tile at a time. Its buffers keep their capacity between calls,
/// so reuse a generator per thread instead of creating one per tile.
#[derive(Debug, Default)]
pub struct TileGenerator {
    raw_grid: CompactSpanGrid,
    grid: CompactSpanGrid,
    distances: Vec<u16>,
    blur_scratch: Vec<u16>,
    labels: Vec<u16>,
    paints: Vec<u16>,
    markups: Vec<MarkupData>,
    palette: Vec<PaintData>,
    regions: Vec<Region>,
    polygons: Vec<Polygon>,
    mesh: GeneratedMesh,
    metadata: TileMetaData,
    nodes: Vec<BvNode>,
    debug: Option<DebugSnapshot>,
}

/// Which volumes the expanded tile box intersects.
struct VolumeCheck {
    /// No exclusion touches the box and the boundary, if any, covers all of it.
    fully_contained: bool,
}

impl TileGenerator {
    /// Creates an empty generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// The intermediate data of the last [`TileGenerator::generate`] call with
    /// [`GenerateFlags::DEBUG_INFO`] set.
    pub fn debug_snapshot(&self) -> Option<&DebugSnapshot> {
        self.debug.as_ref()
    }

    /// Builds the tile described by `params` into `tile` and `metadata`. Returns the tile's content hash.
    ///
    /// On error, `tile` and `metadata` are left untouched.
    pub fn generate(
        &mut self,
        params: &TileGeneratorParams,
        tile: &mut Tile,
        metadata: &mut TileMetaData,
    ) -> Result<u32, GenerateError> {
        if params.size.max_element() > TileGeneratorParams::MAX_TILE_SIZE {
            return Err(GenerateError::InvalidTileSize { size: params.size });
        }
        // Negated so that NaN fails too.
        if !(params.voxel_size.min_element() >= TileGeneratorParams::MIN_VOXEL_SIZE) {
            return Err(GenerateError::InvalidVoxelSize {
                voxel_size: params.voxel_size,
            });
        }

        let tile_aabb = params.tile_aabb();
        if params
            .boundary
            .is_some_and(|boundary| !boundary.overlaps(&tile_aabb))
        {
            return Err(GenerateError::OutsideBoundary);
        }

        let aabb = expanded_tile_aabb(params);
        let VolumeCheck { fully_contained } = check_volumes(params, &aabb)?;

        self.reset(params);
        let seed = self.hash_seed(params, &aabb, fully_contained);

        self.mesh.reset_hash_seed(seed);
        if let Some(extensions) = params.extensions {
            let extension_params = ExtensionParams {
                tile_aabb,
                extended_aabb: aabb,
                agent_type_id: params.agent_type_id,
                boundary: params.boundary,
                exclusions: params.exclusions,
            };
            extensions.run(&extension_params, &mut self.mesh);
        }
        let seed = self.mesh.complete_and_get_hash_value();

        let empty = TriMesh::default();
        let source = params.geometry.unwrap_or(&empty);
        let hash_test = !params
            .flags
            .intersects(GenerateFlags::NO_HASH_TEST | GenerateFlags::UPDATE_MARKUPS);
        let mut voxelizer = WorldVoxelizer::new(aabb, params.voxel_size)?;
        let voxelization =
            voxelizer.process_geometry(source, seed, hash_test.then_some(params.hash_value));
        let hash = voxelization.hash;
        if voxelization.unchanged {
            return Err(GenerateError::Unchanged { hash });
        }
        tracing::debug!(
            "Voxelized {} triangles into tile at {}",
            voxelization.triangle_count,
            params.origin
        );

        if voxelization.triangle_count > 0 {
            voxelizer.span_grid().compact_into(&mut self.raw_grid);
            self.generate_from_voxels(params, &aabb, fully_contained);
        }

        if params.flags.contains(GenerateFlags::BUILD_BV_TREE) {
            build_bv_tree(self.mesh.vertices(), self.mesh.triangles(), &mut self.nodes);
        }

        if self.mesh.is_empty() {
            return Err(GenerateError::EmptyMesh { hash });
        }

        tile.vertices.clear();
        tile.vertices.extend_from_slice(self.mesh.vertices());
        tile.triangles.clear();
        tile.triangles.extend_from_slice(self.mesh.triangles());
        tile.nodes.clear();
        tile.nodes.extend_from_slice(&self.nodes);
        tile.hash_value = hash;
        metadata.clone_from(&self.metadata);

        tracing::debug!(
            "Generated tile at {} with {} vertices, {} triangles and {} BVH nodes",
            params.origin,
            tile.vertices.len(),
            tile.triangles.len(),
            tile.nodes.len()
        );
        Ok(hash)
    }

    fn reset(&mut self, params: &TileGeneratorParams) {
        self.raw_grid.clear();
        self.grid.clear();
        self.distances.clear();
        self.labels.clear();
        self.paints.clear();
        self.markups.clear();
        self.palette.clear();
        self.regions.clear();
        self.polygons.clear();
        self.mesh.clear(params.origin);
        self.metadata.clear();
        self.nodes.clear();
        if params.flags.contains(GenerateFlags::DEBUG_INFO) {
            self.debug.get_or_insert_default().clear();
        } else {
            self.debug = None;
        }
    }

    /// Collects the markups overlapping the tile and folds every volume the result depends on into a hash seed.
    fn hash_seed(&mut self, params: &TileGeneratorParams, aabb: &Aabb3d, fully_contained: bool) -> u32 {
        let expanded = aabb.expanded(params.agent.radius as f32 * params.voxel_size);
        for (index, markup) in params.markups.iter().enumerate() {
            let check = if markup.expand_by_agent_radius {
                &expanded
            } else {
                aabb
            };
            if markup.volume.contains(check) != Overlap::None {
                self.markups.push(MarkupData {
                    markup_index: index,
                    paint_index: 0,
                });
            }
        }

        if fully_contained && self.markups.is_empty() {
            return FULLY_CONTAINED_SEED;
        }

        let mut hasher = HashComputer::default();
        if !fully_contained {
            for volume in params.exclusions.iter().chain(params.boundary) {
                for vertex in volume.vertices() {
                    hasher.add_vec3(*vertex);
                }
                hasher.add_f32(volume.height());
            }
        }
        for markup in &self.markups {
            let volume = &params.markups[markup.markup_index];
            for vertex in volume.volume.vertices() {
                hasher.add_vec3(*vertex);
            }
            hasher.add_u32(volume.store_triangles as u32);
            hasher.add_u32(*volume.area as u32);
            hasher.add_f32(volume.volume.height());
        }
        hasher.complete();
        hasher.value()
    }

    /// Runs everything from filtering to triangulation on the voxelized tile.
    fn generate_from_voxels(
        &mut self,
        params: &TileGeneratorParams,
        aabb: &Aabb3d,
        fully_contained: bool,
    ) {
        let border_h = params.border_size_h();
        let border_v = params.border_size_v();
        let top = params.top();
        let agent = &params.agent;
        let erosion = params.erosion();

        if let Some(debug) = &mut self.debug {
            debug.raw_grid.clone_from(&self.raw_grid);
        }

        let filter = WalkableFilter {
            agent_height: agent.height,
            climbable_height: agent.climbable_height,
            max_water_depth: agent.max_water_depth,
            incline_gradient: agent.climbable_incline_gradient,
            step_ratio: agent.climbable_step_ratio,
            space_top: (2 * border_v + agent.height as usize + top) as u16,
            border: border_h,
        };
        let mut rejected = self.debug.as_mut().map(|debug| &mut debug.rejected);
        let rejected_count = self
            .raw_grid
            .mark_unwalkable_spans(&filter, rejected.as_deref_mut());
        if !fully_contained {
            self.raw_grid.mark_spans_outside_volumes(
                aabb,
                params.voxel_size,
                params.exclusions,
                params.boundary,
                rejected,
            );
        }
        let walkable = self
            .raw_grid
            .compact_excluding(SpanFlags::NOT_WALKABLE, &mut self.grid);
        tracing::debug!(
            "{} of {} spans are walkable, {} failed the agent tests",
            walkable,
            self.raw_grid.spans.len(),
            rejected_count
        );
        if walkable == 0 {
            return;
        }

        self.grid
            .distance_transform(agent.climbable_height, &mut self.distances);
        if params.blur_amount > 0 {
            self.grid.blur_distances(
                agent.climbable_height,
                params.blur_amount,
                &mut self.distances,
                &mut self.blur_scratch,
            );
        }

        self.labels.resize(self.grid.spans.len(), NO_LABEL);
        self.grid
            .paint_border(&mut self.labels, border_h, border_v, top);

        create_paint_palette(
            &mut self.markups,
            params.markups,
            params.default_area,
            &mut self.palette,
        );
        let paint_area = PaintArea {
            aabb: *aabb,
            voxel_size: params.voxel_size,
            border: border_h,
            agent_radius: agent.radius,
        };
        self.grid.calc_paint_values(
            &paint_area,
            &self.markups,
            params.markups,
            &self.distances,
            &self.labels,
            erosion,
            &mut self.paints,
        );

        let extraction = ContourExtraction {
            grid: &self.grid,
            distances: &self.distances,
            paints: &self.paints,
            band: BorderBand::new(border_h, self.grid.width, self.grid.height),
            border_v: border_v as u16,
            top: top as u16,
            erosion,
            climbable_height: agent.climbable_height,
        };
        extraction.extract(
            &mut self.labels,
            &mut self.regions,
            self.debug.as_mut().map(|debug| &mut debug.tracer_paths),
        );
        filter_bad_regions(&mut self.regions, params.min_walkable_area as usize);
        simplify_regions(&self.regions, &mut self.polygons);
        tracing::debug!(
            "Extracted {} regions, {} polygons left after simplification",
            self.regions.len(),
            self.polygons.len()
        );

        let triangulation = Triangulation {
            agent_height: agent.height,
            border_h: border_h as u16,
            border_v: border_v as u16,
            voxel_size: params.voxel_size,
            palette: &self.palette,
            markups: params.markups,
        };
        let triangles = triangulation.triangulate(&self.polygons, &mut self.mesh, &mut self.metadata);
        tracing::debug!("Triangulated {} triangles", triangles);

        if let Some(debug) = &mut self.debug {
            debug.walkable_grid.clone_from(&self.grid);
            debug.distances.clone_from(&self.distances);
            debug.labels.clone_from(&self.labels);
            debug.paints.clone_from(&self.paints);
            debug.regions.clone_from(&self.regions);
            debug.polygons.clone_from(&self.polygons);
        }
    }
}

/// The tile box grown by the border band, with room for an agent standing on its top.
fn expanded_tile_aabb(params: &TileGeneratorParams) -> Aabb3d {
    let border = Vec3::new(
        params.border_size_h() as f32,
        params.border_size_h() as f32,
        params.border_size_v() as f32,
    );
    let mut aabb = params.tile_aabb().expanded(border * params.voxel_size);
    aabb.max.z += params.agent.height as f32 * params.voxel_size.z;
    aabb
}

fn check_volumes(params: &TileGeneratorParams, aabb: &Aabb3d) -> Result<VolumeCheck, GenerateError> {
    let mut fully_contained = true;
    for exclusion in params.exclusions {
        match exclusion.contains(aabb) {
            Overlap::Full => return Err(GenerateError::FullyExcluded),
            Overlap::Partial => fully_contained = false,
            Overlap::None => {}
        }
    }
    if let Some(boundary) = params.boundary {
        match boundary.contains(aabb) {
            Overlap::None => return Err(GenerateError::OutsideBoundary),
            Overlap::Partial => fully_contained = false,
            Overlap::Full => {}
        }
    }
    Ok(VolumeCheck { fully_contained })
}
