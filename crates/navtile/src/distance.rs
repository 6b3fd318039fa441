//! Distance of every walkable span to the nearest edge of the walkable surface.
//! Erosion and paint both read it. Distances are measured in half voxels.

use glam::IVec2;

use crate::{compact_span_grid::CompactSpanGrid, math::NEIGHBOUR_OFFSETS};

/// Starting distance of every span before the sweeps bring it down.
const UNREACHED: u16 = 0x0FFF;

/// Spans this close to an edge are never blurred.
const BLUR_THRESHOLD: u16 = 1;

/// Neighbour offsets and their chamfer weights for the forward sweep.
const FORWARD_SWEEP: [(IVec2, u16); 4] = [
    (IVec2::new(-1, 0), 2),
    (IVec2::new(-1, -1), 3),
    (IVec2::new(0, -1), 2),
    (IVec2::new(1, -1), 3),
];

/// Neighbour offsets and their chamfer weights for the backward sweep.
const BACKWARD_SWEEP: [(IVec2, u16); 4] = [
    (IVec2::new(1, 0), 2),
    (IVec2::new(1, 1), 3),
    (IVec2::new(0, 1), 2),
    (IVec2::new(-1, 1), 3),
];

impl CompactSpanGrid {
    /// Computes a 2-3 chamfer distance from every span to the nearest edge of the walkable surface,
    /// where a missing neighbour counts as edge.
    ///
    /// Neighbours are the spans of adjacent columns within `climbable_height` of a span's top.
    /// One unit of distance equals half a voxel.
    pub(crate) fn distance_transform(&self, climbable_height: u16, distances: &mut Vec<u16>) {
        distances.clear();
        distances.resize(self.spans.len(), UNREACHED);

        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                self.sweep_column(x, y, climbable_height, &FORWARD_SWEEP, distances);
            }
        }
        for y in (0..self.height as usize).rev() {
            for x in (0..self.width as usize).rev() {
                self.sweep_column(x, y, climbable_height, &BACKWARD_SWEEP, distances);
            }
        }
    }

    fn sweep_column(
        &self,
        x: usize,
        y: usize,
        climbable_height: u16,
        sweep: &[(IVec2, u16); 4],
        distances: &mut [u16],
    ) {
        for index in self.cell_at(x, y).index_range() {
            let top = self.spans[index].top();
            let minimum = sweep
                .iter()
                .map(|(offset, weight)| {
                    self.span_at(x as i32 + offset.x, y as i32 + offset.y, top, climbable_height)
                        .map_or(0, |neighbour| distances[neighbour] + weight)
                })
                .min()
                .unwrap_or(0);
            if minimum < distances[index] {
                distances[index] = minimum;
            }
        }
    }

    /// Smooths the distance field `amount` times with a 3x3 box filter.
    ///
    /// Spans at the very edge keep their distance. Missing neighbours count as the span's own distance.
    pub(crate) fn blur_distances(
        &self,
        climbable_height: u16,
        amount: u8,
        distances: &mut Vec<u16>,
        scratch: &mut Vec<u16>,
    ) {
        scratch.clear();
        scratch.resize(distances.len(), 0);
        for _ in 0..amount {
            for y in 0..self.height as usize {
                for x in 0..self.width as usize {
                    for index in self.cell_at(x, y).index_range() {
                        let original = distances[index];
                        if original <= BLUR_THRESHOLD {
                            scratch[index] = original;
                            continue;
                        }
                        let top = self.spans[index].top();
                        let sum: u32 = NEIGHBOUR_OFFSETS
                            .iter()
                            .map(|offset| {
                                self.span_at(
                                    x as i32 + offset.x,
                                    y as i32 + offset.y,
                                    top,
                                    climbable_height,
                                )
                                .map_or(original, |neighbour| distances[neighbour])
                                    as u32
                            })
                            .sum::<u32>()
                            + original as u32;
                        scratch[index] = ((sum + 5) / 9) as u16;
                    }
                }
            }
            std::mem::swap(distances, scratch);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compact_span::CompactSpan;

    use super::*;

    fn flat_grid(width: u16, height: u16) -> CompactSpanGrid {
        let mut grid = CompactSpanGrid::default();
        grid.reset(width, height);
        for y in 0..height as usize {
            for x in 0..width as usize {
                grid.push_span(
                    x,
                    y,
                    CompactSpan {
                        bottom: 4,
                        height: 1,
                        ..Default::default()
                    },
                );
            }
        }
        grid
    }

    fn distance_at(grid: &CompactSpanGrid, distances: &[u16], x: usize, y: usize) -> u16 {
        distances[grid.cell_at(x, y).index() as usize]
    }

    #[test]
    fn distance_grows_away_from_edges() {
        let grid = flat_grid(9, 9);
        let mut distances = vec![];
        grid.distance_transform(2, &mut distances);

        assert_eq!(distance_at(&grid, &distances, 0, 4), 0);
        assert_eq!(distance_at(&grid, &distances, 8, 4), 0);
        assert_eq!(distance_at(&grid, &distances, 1, 4), 2);
        assert_eq!(distance_at(&grid, &distances, 2, 4), 4);
        assert_eq!(distance_at(&grid, &distances, 4, 4), 8);
        assert_eq!(distance_at(&grid, &distances, 1, 1), 2);
    }

    #[test]
    fn neighbouring_distances_differ_by_at_most_a_diagonal_step() {
        let mut grid = flat_grid(12, 10);
        // A step nobody can climb splits the grid into two surfaces.
        for y in 0..10 {
            let index = grid.cell_at(6, y).index() as usize;
            grid.spans[index].height = 20;
        }
        let mut distances = vec![];
        grid.distance_transform(2, &mut distances);

        for y in 0..10_i32 {
            for x in 0..12_i32 {
                let index = grid.cell_at(x as usize, y as usize).index() as usize;
                let top = grid.spans[index].top();
                for offset in NEIGHBOUR_OFFSETS {
                    if let Some(neighbour) = grid.span_at(x + offset.x, y + offset.y, top, 2) {
                        assert!(
                            distances[index] <= distances[neighbour] + 3,
                            "({x}, {y}) is {} but a neighbour is {}",
                            distances[index],
                            distances[neighbour]
                        );
                    }
                }
            }
        }
        assert_eq!(distance_at(&grid, &distances, 5, 5), 0);
        assert_eq!(distance_at(&grid, &distances, 7, 5), 0);
        assert_eq!(distance_at(&grid, &distances, 6, 5), 0);
    }

    #[test]
    fn blur_keeps_edges_and_smooths_the_inside() {
        let grid = flat_grid(9, 9);
        let mut distances = vec![];
        grid.distance_transform(2, &mut distances);
        let before = distances.clone();
        let mut scratch = vec![];
        grid.blur_distances(2, 1, &mut distances, &mut scratch);

        assert_eq!(distance_at(&grid, &distances, 0, 4), 0);
        // The neighbours of (1, 1) sum up to 2 + 2 + 4, plus its own 2.
        assert_eq!(distance_at(&grid, &distances, 1, 1), (2 + 2 + 2 + 4 + 5) / 9);
        assert_ne!(distances, before);
        // Blurring zero times leaves the field untouched.
        let mut untouched = before.clone();
        grid.blur_distances(2, 0, &mut untouched, &mut scratch);
        assert_eq!(untouched, before);
    }
}
