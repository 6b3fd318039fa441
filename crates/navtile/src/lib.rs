#![doc = include_str!("../../../readme.md")]

mod area;
mod border;
mod bounding_volume;
mod bvh;
mod compact_cell;
mod compact_span;
mod compact_span_grid;
mod config;
mod contours;
mod debug;
mod distance;
mod extension;
mod filter;
mod generator;
mod hash;
mod label;
pub(crate) mod math;
mod mesh;
mod paint;
mod simplify;
mod span;
mod span_grid;
mod tile;
mod tracer;
mod triangulate;
mod trimesh;
mod voxelizer;

pub use area::AreaAnnotation;
pub use bounding_volume::{BoundingVolume, Overlap};
pub use bvh::{BvNode, BvNodeKind, build_bv_tree};
pub use compact_cell::CompactCell;
pub use compact_span::CompactSpan;
pub use compact_span_grid::CompactSpanGrid;
pub use config::{
    AgentSettings, AgentSettingsBuilder, GenerateFlags, MarkupId, MarkupVolume,
    TileGeneratorParams,
};
pub use contours::{Contour, ContourVertex, ContourVertexFlags, Region, RegionFlags};
pub use debug::DebugSnapshot;
pub use extension::{ExtensionId, ExtensionParams, TileGeneratorExtension, TileGeneratorExtensions};
pub use filter::{NeighbourRejection, NonWalkableReason, RejectedSpan};
pub use generator::{GenerateError, TileGenerator};
pub use hash::HashComputer;
pub use math::Aabb3d;
pub use mesh::GeneratedMesh;
pub use paint::PaintData;
pub use simplify::{Hole, Polygon};
pub use span::{SpanFlags, SpanKey};
pub use span_grid::{DynamicSpanGrid, SpanGridBuilder, SpanGridError, SpanInsertionError};
pub use tile::{Tile, TileMetaData, TileTriangle};
pub use tracer::{Tracer, TracerPath};
pub use trimesh::TriMesh;
pub use voxelizer::{GeometryInstance, GeometryScene, GeometrySource, Voxelization, WorldVoxelizer};
