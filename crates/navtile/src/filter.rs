//! Marks the spans an agent cannot stand on.

use glam::Vec3;

use crate::{
    border::BorderBand,
    bounding_volume::BoundingVolume,
    compact_cell::CompactCell,
    compact_span_grid::CompactSpanGrid,
    math::{Aabb3d, NEIGHBOUR_OFFSETS},
    span::SpanFlags,
};

/// Why the walkability filter rejected a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonWalkableReason {
    /// The span's top was produced by a downward facing triangle.
    Backface,
    /// The water above the span is too deep.
    Water,
    /// The span above is too close.
    Clearance,
    /// An adjacent column rules the span out.
    Neighbour(NeighbourRejection),
    /// The span lies inside an exclusion volume.
    Exclusion,
    /// The span lies outside the boundary volume.
    Boundary,
}

/// The neighbour test that failed for a [`NonWalkableReason::Neighbour`] rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NeighbourRejection {
    /// The adjacent column is empty.
    Empty,
    /// No span of the adjacent column is reachable with enough headroom.
    Clearance,
    /// The adjacent step is too high for its width.
    Step,
    /// The ground rises too steeply.
    Incline,
}

/// A span rejected by the walkability filter, recorded for debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedSpan {
    /// Column x coordinate.
    pub x: u16,
    /// Column y coordinate.
    pub y: u16,
    /// Index of the span in the unfiltered grid.
    pub span: usize,
    /// What ruled the span out.
    pub reason: NonWalkableReason,
}

/// Agent limits as seen by the walkability filter. All lengths in voxels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkableFilter {
    pub(crate) agent_height: u16,
    pub(crate) climbable_height: u16,
    pub(crate) max_water_depth: u16,
    pub(crate) incline_gradient: f32,
    pub(crate) step_ratio: f32,
    /// Ceiling used for the topmost span of every column.
    pub(crate) space_top: u16,
    pub(crate) border: usize,
}

impl WalkableFilter {
    /// Probes must reach past the climbable height to tell steps from slopes.
    #[inline]
    fn incline_test_count(&self) -> u32 {
        self.climbable_height as u32 + 1
    }

    /// The span's top and the bottom of whatever is above it.
    fn clearance(&self, grid: &CompactSpanGrid, cell: CompactCell, index: usize) -> Clearance {
        let top = grid.spans[index].top();
        let next_bottom = if index + 1 < cell.index_range().end {
            grid.spans[index + 1].bottom
        } else {
            self.space_top
        };
        Clearance { top, next_bottom }
    }

    /// Finds the first span of `cell` an agent standing at `from` could move to.
    fn reachable_span(
        &self,
        grid: &CompactSpanGrid,
        cell: CompactCell,
        from: Clearance,
    ) -> Option<Clearance> {
        cell.index_range()
            .map(|index| self.clearance(grid, cell, index))
            .find(|to| {
                to.top.abs_diff(from.top) <= self.climbable_height
                    && to.next_bottom.min(from.next_bottom) as u32
                        >= to.top.max(from.top) as u32 + self.agent_height as u32
            })
    }

    /// Runs the four axis-aligned neighbour tests, including the step and incline probes.
    fn check_neighbours(
        &self,
        grid: &CompactSpanGrid,
        x: usize,
        y: usize,
        span: Clearance,
    ) -> Result<(), NeighbourRejection> {
        let mut incline_vars = [0.0_f32; 4];
        let incline_lower_bound = self.incline_gradient.floor() as u32;

        for (n, offset) in NEIGHBOUR_OFFSETS[..4].iter().enumerate() {
            let nx = x as i32 + offset.x;
            let ny = y as i32 + offset.y;
            // Columns off the grid pass.
            let Some(ncell) = grid.cell(nx, ny) else {
                continue;
            };
            if ncell.is_empty() {
                return Err(NeighbourRejection::Empty);
            }
            let Some(first) = self.reachable_span(grid, ncell, span) else {
                return Err(NeighbourRejection::Clearance);
            };

            let first_delta = first.top.abs_diff(span.top) as u32;
            if first_delta == 0 {
                continue;
            }
            let signed_first = first.top as i32 - span.top as i32;
            let step_test_count = (first_delta as f32 * self.step_ratio).ceil() as u32;
            let step_tolerance = step_test_count.saturating_sub(1);
            let is_step = first_delta > incline_lower_bound + 1;
            let mut step_passed = true;

            let mut top_min = first.top;
            let mut top_max = first.top;
            let mut offset_max = first_delta;
            let mut last = first;

            let mut probe = 2;
            while probe <= self.incline_test_count() {
                let px = x as i32 + offset.x * probe as i32;
                let py = y as i32 + offset.y * probe as i32;
                let Some(pcell) = grid.cell(px, py).filter(|cell| !cell.is_empty()) else {
                    break;
                };
                let Some(next) = self.reachable_span(grid, pcell, last) else {
                    break;
                };

                top_min = top_min.min(next.top);
                top_max = top_max.max(next.top);
                offset_max = offset_max.max(next.top.abs_diff(span.top) as u32);
                let signed_last = next.top as i32 - last.top as i32;
                last = next;

                if is_step {
                    if probe <= step_test_count && offset_max > step_tolerance + first_delta {
                        step_passed = false;
                    }
                } else {
                    if (signed_last - signed_first).abs() > 1 {
                        break;
                    }
                    incline_vars[n] = (top_max - top_min) as f32;
                }
                probe += 1;
            }

            if is_step && !step_passed && offset_max > self.climbable_height as u32 {
                return Err(NeighbourRejection::Step);
            }
            incline_vars[n] /= (probe - 1) as f32;
        }

        // Each direction is paired with the one before it, starting with the last.
        let gradient_sq = self.incline_gradient * self.incline_gradient;
        let mut previous = incline_vars[3] * incline_vars[3];
        for var in incline_vars {
            let current = var * var;
            if current + previous > gradient_sq {
                return Err(NeighbourRejection::Incline);
            }
            previous = current;
        }
        Ok(())
    }

    fn check_span(
        &self,
        grid: &CompactSpanGrid,
        x: usize,
        y: usize,
        cell: CompactCell,
        index: usize,
    ) -> Result<(), NonWalkableReason> {
        let span = grid.spans[index];
        if span.flags.contains(SpanFlags::BACKFACE) {
            return Err(NonWalkableReason::Backface);
        }
        if span.depth > self.max_water_depth {
            return Err(NonWalkableReason::Water);
        }
        let clearance = self.clearance(grid, cell, index);
        if clearance.next_bottom.saturating_sub(clearance.top) < self.agent_height {
            return Err(NonWalkableReason::Clearance);
        }
        self.check_neighbours(grid, x, y, clearance)
            .map_err(NonWalkableReason::Neighbour)
    }
}

#[derive(Debug, Clone, Copy)]
struct Clearance {
    top: u16,
    next_bottom: u16,
}

impl CompactSpanGrid {
    /// Flags every span that fails the walkability tests with [`SpanFlags::NOT_WALKABLE`]
    /// and the outermost ring of the tile proper with [`SpanFlags::TILE_BOUNDARY`].
    ///
    /// Returns the number of rejected spans.
    pub(crate) fn mark_unwalkable_spans(
        &mut self,
        filter: &WalkableFilter,
        mut rejected: Option<&mut Vec<RejectedSpan>>,
    ) -> usize {
        let band = BorderBand::new(filter.border, self.width, self.height);
        let mut rejected_count = 0;
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                let cell = self.cell_at(x, y);
                let boundary = band.is_boundary_cell(x as i32, y as i32);
                for index in cell.index_range() {
                    if boundary {
                        self.spans[index].flags |= SpanFlags::TILE_BOUNDARY;
                    }
                    // Flags set so far don't influence the tests of later spans.
                    if let Err(reason) = filter.check_span(self, x, y, cell, index) {
                        self.spans[index].flags |= SpanFlags::NOT_WALKABLE;
                        rejected_count += 1;
                        if let Some(rejected) = rejected.as_deref_mut() {
                            rejected.push(RejectedSpan {
                                x: x as u16,
                                y: y as u16,
                                span: index,
                                reason,
                            });
                        }
                    }
                }
            }
        }
        rejected_count
    }

    /// Rejects walkable spans inside the exclusions or outside the boundary.
    ///
    /// Every span is sampled at the centre of its top voxel. `aabb` is the box the grid covers.
    pub(crate) fn mark_spans_outside_volumes(
        &mut self,
        aabb: &Aabb3d,
        voxel_size: Vec3,
        exclusions: &[BoundingVolume],
        boundary: Option<&BoundingVolume>,
        mut rejected: Option<&mut Vec<RejectedSpan>>,
    ) {
        let conv = voxel_size.recip();
        let half_voxel = voxel_size * 0.5;
        let extent = aabb.size();
        let sample = |x: usize, y: usize, top: u16| {
            aabb.min + half_voxel + Vec3::new(x as f32, y as f32, top as f32) * voxel_size
        };
        let mut reject = |spans: &mut CompactSpanGrid, x: usize, y: usize, index: usize, reason| {
            spans.spans[index].flags |= SpanFlags::NOT_WALKABLE;
            if let Some(rejected) = rejected.as_deref_mut() {
                rejected.push(RejectedSpan {
                    x: x as u16,
                    y: y as u16,
                    span: index,
                    reason,
                });
            }
        };

        for exclusion in exclusions {
            if !exclusion.overlaps(aabb) {
                continue;
            }
            let min = (exclusion.aabb().min - aabb.min).max(Vec3::ZERO) * conv;
            let max = (exclusion.aabb().max - aabb.min).min(extent) * conv;
            let x_max = (max.x as usize).min(self.width as usize - 1);
            let y_max = (max.y as usize).min(self.height as usize - 1);
            let (z_min, z_max) = (min.z as u16, max.z as u16);

            for y in min.y as usize..=y_max {
                for x in min.x as usize..=x_max {
                    for index in self.cell_at(x, y).index_range() {
                        let span = self.spans[index];
                        if !span.is_walkable() {
                            continue;
                        }
                        let top = span.top();
                        if (z_min..=z_max).contains(&top) && exclusion.contains_point(sample(x, y, top))
                        {
                            reject(self, x, y, index, NonWalkableReason::Exclusion);
                        }
                    }
                }
            }
        }

        let Some(boundary) = boundary else {
            return;
        };
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                for index in self.cell_at(x, y).index_range() {
                    let span = self.spans[index];
                    if span.is_walkable() && !boundary.contains_point(sample(x, y, span.top())) {
                        reject(self, x, y, index, NonWalkableReason::Boundary);
                    }
                }
            }
        }
    }
}
