use crate::{
    compact_span_grid::CompactSpanGrid, contours::Region, filter::RejectedSpan, simplify::Polygon,
    tracer::TracerPath,
};

/// Intermediate results of the last [`TileGenerator::generate`](crate::TileGenerator::generate) call,
/// recorded when [`GenerateFlags::DEBUG_INFO`](crate::GenerateFlags::DEBUG_INFO) is set.
///
/// Per-span arrays are indexed like [`DebugSnapshot::walkable_grid`]'s spans,
/// except for [`RejectedSpan::span`] which indexes [`DebugSnapshot::raw_grid`].
#[derive(Debug, Clone, Default)]
pub struct DebugSnapshot {
    /// The voxelized geometry before filtering.
    pub raw_grid: CompactSpanGrid,
    /// The spans left after filtering.
    pub walkable_grid: CompactSpanGrid,
    /// Every span the filter rejected, and why.
    pub rejected: Vec<RejectedSpan>,
    /// Distance of every walkable span to the nearest edge. `[Units: half vx]`
    pub distances: Vec<u16>,
    /// Region label and flags of every walkable span.
    pub labels: Vec<u16>,
    /// Paint of every walkable span.
    pub paints: Vec<u16>,
    /// Every contour walk that produced a region or a hole.
    pub tracer_paths: Vec<TracerPath>,
    /// The regions, after small ones were filtered.
    pub regions: Vec<Region>,
    /// The simplified polygons.
    pub polygons: Vec<Polygon>,
}

impl DebugSnapshot {
    pub(crate) fn clear(&mut self) {
        self.raw_grid.clear();
        self.walkable_grid.clear();
        self.rejected.clear();
        self.distances.clear();
        self.labels.clear();
        self.paints.clear();
        self.tracer_paths.clear();
        self.regions.clear();
        self.polygons.clear();
    }
}
