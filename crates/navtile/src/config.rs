use glam::{UVec3, Vec3};

use crate::{
    area::AreaAnnotation, bounding_volume::BoundingVolume, extension::TileGeneratorExtensions,
    math::Aabb3d, voxelizer::GeometrySource,
};

/// Describes what an agent can traverse. Usually built using [`AgentSettingsBuilder`].
///
/// Lengths are in voxels (vx) of the grid the tile is generated with.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentSettings {
    /// The radius of the agent's cylinder. `[Limit: >= 0] [Units: vx]`
    ///
    /// The walkable area is eroded by this amount, so the final mesh keeps this distance to obstacles.
    pub radius: u16,

    /// Minimum floor to 'ceiling' height that still allows the floor to be walked on. `[Limit: > 0] [Units: vx]`
    pub height: u16,

    /// Maximum ledge height that is considered to still be traversable. `[Limit: >= 0] [Units: vx]`
    ///
    /// Also used as the vertical tolerance when looking up neighbouring spans.
    pub climbable_height: u16,

    /// Maximum water depth the agent can wade through. `[Limit: >= 0] [Units: vx]`
    pub max_water_depth: u16,

    /// Maximum average height change per voxel step for a surface to count as a walkable incline.
    /// `[Limit: >= 0] [Units: vx per vx]`
    pub climbable_incline_gradient: f32,

    /// How far past a step the surface must stay level, relative to the step's height.
    /// `[Limit: >= 0]`
    pub climbable_step_ratio: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        AgentSettingsBuilder::default().build(Vec3::splat(0.1))
    }
}

impl AgentSettings {
    /// How many columns around the tile can influence the tile's walkable area.
    #[inline]
    pub fn possible_affected_size_h(&self) -> usize {
        self.radius as usize + 1
    }

    /// How many voxel layers above and below the tile can influence the tile's walkable area.
    #[inline]
    pub fn possible_affected_size_v(&self) -> usize {
        self.climbable_height as usize + 1
    }
}

/// A builder for [`AgentSettings`], taking world units.
/// The default values are chosen to be reasonable for an agent resembling an adult human.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AgentSettingsBuilder {
    /// The radius of the agent. `[Limit: >= 0] [Units: wu]`
    pub agent_radius: f32,
    /// The height of the agent. `[Limit: > 0] [Units: wu]`
    ///
    /// It's often a good idea to add a little bit of padding to the height.
    pub agent_height: f32,
    /// The highest ledge the agent can step up or down. `[Limit: >= 0] [Units: wu]`
    pub agent_max_climb: f32,
    /// The deepest water the agent can wade through. `[Limit: >= 0] [Units: wu]`
    pub agent_max_water_depth: f32,
    /// The steepest walkable incline. `[Limits: 0 <= value < 0.5*π] [Units: Radians]`
    pub agent_max_slope: f32,
    /// See [`AgentSettings::climbable_step_ratio`].
    pub step_ratio: f32,
}

impl Default for AgentSettingsBuilder {
    fn default() -> Self {
        Self {
            agent_radius: 0.4,
            agent_height: 1.8,
            agent_max_climb: 0.4,
            agent_max_water_depth: 0.8,
            agent_max_slope: 45.0_f32.to_radians(),
            step_ratio: 0.75,
        }
    }
}

impl AgentSettingsBuilder {
    /// Converts the settings to voxel units of a grid with the given voxel size.
    pub fn build(self, voxel_size: Vec3) -> AgentSettings {
        AgentSettings {
            radius: (self.agent_radius / voxel_size.x).ceil() as u16,
            height: (self.agent_height / voxel_size.z).ceil() as u16,
            climbable_height: (self.agent_max_climb / voxel_size.z).floor() as u16,
            max_water_depth: (self.agent_max_water_depth / voxel_size.z).floor() as u16,
            climbable_incline_gradient: self.agent_max_slope.tan() * voxel_size.x / voxel_size.z,
            climbable_step_ratio: self.step_ratio,
        }
    }
}

bitflags::bitflags! {
    /// Switches for a single [`TileGenerator::generate`](crate::TileGenerator::generate) call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    pub struct GenerateFlags: u16 {
        /// Don't pad the tile with a border band of neighbouring geometry.
        const NO_BORDER = 1 << 0;
        /// Don't erode the walkable area by the agent radius.
        const NO_EROSION = 1 << 1;
        /// Always regenerate, even if the content hash matches the previous one.
        const NO_HASH_TEST = 1 << 2;
        /// Build a bounding volume hierarchy over the output triangles.
        const BUILD_BV_TREE = 1 << 3;
        /// The tile is regenerated because markup data changed.
        /// The content hash is still computed, but a match does not skip the build.
        const UPDATE_MARKUPS = 1 << 4;
        /// Keep intermediate data for inspection, see [`TileGenerator::debug_snapshot`](crate::TileGenerator::debug_snapshot).
        const DEBUG_INFO = 1 << 5;
    }
}

impl Default for GenerateFlags {
    fn default() -> Self {
        Self::BUILD_BV_TREE
    }
}

/// Identifies a markup volume in the output [`TileMetaData`](crate::TileMetaData).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct MarkupId(pub u32);

/// A volume that paints an [`AreaAnnotation`] onto the walkable area it covers.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MarkupVolume {
    /// Identifies the markup in the output metadata.
    pub id: MarkupId,
    /// The painted footprint and height range.
    pub volume: BoundingVolume,
    /// The annotation of the triangles generated inside the markup.
    pub area: AreaAnnotation,
    /// Give this markup its own paint and record its triangle indices in the metadata.
    /// Otherwise it shares a paint with every other markup of the same annotation.
    pub store_triangles: bool,
    /// Grow the painted footprint by the agent radius.
    pub expand_by_agent_radius: bool,
}

/// All inputs of a single [`TileGenerator::generate`](crate::TileGenerator::generate) call.
#[derive(Clone, Copy)]
pub struct TileGeneratorParams<'a> {
    /// The minimum corner of the tile in world space. `[Units: wu]`
    pub origin: Vec3,
    /// The size of the tile. `[Limit: <= 18] [Units: wu]`
    pub size: UVec3,
    /// The size of a voxel. `[Limit: >= 0.025] [Units: wu]`
    pub voxel_size: Vec3,
    /// The agent the tile is built for.
    pub agent: AgentSettings,
    /// Build switches.
    pub flags: GenerateFlags,
    /// Regions with at most this many spans are dropped unless they touch the tile border. `[Units: spans]`
    pub min_walkable_area: u32,
    /// Radius of the box blur applied to the distance field. 0 disables it. `[Units: vx]`
    pub blur_amount: u8,
    /// The content hash of the previous build, used to skip unchanged tiles.
    pub hash_value: u32,
    /// Only the walkable area inside this volume is kept.
    pub boundary: Option<&'a BoundingVolume>,
    /// The walkable area inside these volumes is removed.
    pub exclusions: &'a [BoundingVolume],
    /// Volumes painting annotations onto the walkable area.
    pub markups: &'a [MarkupVolume],
    /// The annotation of triangles not covered by any markup.
    pub default_area: AreaAnnotation,
    /// The world geometry.
    pub geometry: Option<&'a dyn GeometrySource>,
    /// Hooks that may add triangles to the tile.
    pub extensions: Option<&'a TileGeneratorExtensions>,
    /// Passed through to the extensions.
    pub agent_type_id: u32,
}

impl Default for TileGeneratorParams<'_> {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            size: UVec3::splat(8),
            voxel_size: Vec3::splat(0.1),
            agent: AgentSettings::default(),
            flags: GenerateFlags::default(),
            min_walkable_area: 16,
            blur_amount: 0,
            hash_value: 0,
            boundary: None,
            exclusions: &[],
            markups: &[],
            default_area: AreaAnnotation::default(),
            geometry: None,
            extensions: None,
            agent_type_id: 0,
        }
    }
}

impl std::fmt::Debug for TileGeneratorParams<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGeneratorParams")
            .field("origin", &self.origin)
            .field("size", &self.size)
            .field("voxel_size", &self.voxel_size)
            .field("agent", &self.agent)
            .field("flags", &self.flags)
            .field("min_walkable_area", &self.min_walkable_area)
            .field("blur_amount", &self.blur_amount)
            .field("hash_value", &self.hash_value)
            .field("boundary", &self.boundary)
            .field("exclusions", &self.exclusions.len())
            .field("markups", &self.markups.len())
            .field("default_area", &self.default_area)
            .field("geometry", &self.geometry.is_some())
            .field("extensions", &self.extensions.is_some())
            .field("agent_type_id", &self.agent_type_id)
            .finish()
    }
}

impl TileGeneratorParams<'_> {
    /// The largest allowed tile size per axis. `[Units: wu]`
    pub const MAX_TILE_SIZE: u32 = 18;
    /// The smallest allowed voxel size per axis. `[Units: wu]`
    pub const MIN_VOXEL_SIZE: f32 = 0.025;

    /// The box covered by the tile itself, without borders.
    #[inline]
    pub fn tile_aabb(&self) -> Aabb3d {
        Aabb3d::new(self.origin, self.origin + self.size.as_vec3())
    }

    /// The tile height in voxels.
    #[inline]
    pub(crate) fn top(&self) -> usize {
        (self.size.z as f32 / self.voxel_size.z).round() as usize
    }

    /// Border band width in voxels.
    #[inline]
    pub(crate) fn border_size_h(&self) -> usize {
        if self.flags.contains(GenerateFlags::NO_BORDER) {
            0
        } else {
            self.agent.possible_affected_size_h()
        }
    }

    /// Border band height in voxels.
    #[inline]
    pub(crate) fn border_size_v(&self) -> usize {
        if self.flags.contains(GenerateFlags::NO_BORDER) {
            0
        } else {
            self.agent.possible_affected_size_v()
        }
    }

    /// Distance field threshold below which a span counts as too close to an edge.
    #[inline]
    pub(crate) fn erosion(&self) -> u16 {
        if self.flags.contains(GenerateFlags::NO_EROSION) {
            0
        } else {
            self.agent.radius * 2
        }
    }
}
