//! The packed, mostly-read voxel column grid the pipeline stages work on.

use crate::{compact_cell::CompactCell, compact_span::CompactSpan, span::SpanFlags};

/// A packed grid of voxel columns.
///
/// Every `(x, y)` column owns a contiguous run of [`CompactSpan`]s in [`CompactSpanGrid::spans`],
/// ordered bottom to top.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactSpanGrid {
    /// The width of the grid along the x-axis in cell units
    pub width: u16,
    /// The height of the grid along the y-axis in cell units
    pub height: u16,
    /// The cells in the grid [Size: `width * height`]
    pub cells: Vec<CompactCell>,
    /// All spans in the grid
    pub spans: Vec<CompactSpan>,
}

impl CompactSpanGrid {
    /// Empties the grid while keeping its allocations.
    pub fn clear(&mut self) {
        self.width = 0;
        self.height = 0;
        self.cells.clear();
        self.spans.clear();
    }

    /// Resets the grid to `width * height` empty columns.
    pub(crate) fn reset(&mut self, width: u16, height: u16) {
        self.clear();
        self.width = width;
        self.height = height;
        self.cells
            .resize(width as usize * height as usize, CompactCell::default());
    }

    /// Appends a span to the column at `(x, y)`.
    ///
    /// Columns must be filled in row-major order and spans bottom to top.
    pub(crate) fn push_span(&mut self, x: usize, y: usize, span: CompactSpan) {
        let index = self.spans.len() as u32;
        let column = x + y * self.width as usize;
        let cell = &mut self.cells[column];
        if cell.is_empty() {
            cell.set_index(index);
        }
        cell.inc_count();
        self.spans.push(span);
    }

    /// Returns `true` if `(x, y)` lies inside the grid.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32
    }

    #[inline]
    pub(crate) fn column_index(&self, x: usize, y: usize) -> usize {
        x + y * self.width as usize
    }

    /// Returns the cell at the given coordinates. Returns `None` if the coordinates are invalid.
    #[inline]
    pub fn cell(&self, x: i32, y: i32) -> Option<CompactCell> {
        if !self.contains(x, y) {
            return None;
        }
        Some(self.cells[self.column_index(x as usize, y as usize)])
    }

    /// Returns the cell at the given coordinates. Panics if the coordinates are invalid.
    #[inline]
    pub fn cell_at(&self, x: usize, y: usize) -> CompactCell {
        self.cells[self.column_index(x, y)]
    }

    /// Finds the span in column `(x, y)` whose top is closest to `top`, no further than `tolerance` away.
    ///
    /// Returns the index of the span in [`CompactSpanGrid::spans`].
    pub fn span_at(&self, x: i32, y: i32, top: u16, tolerance: u16) -> Option<usize> {
        let cell = self.cell(x, y)?;
        let mut best = None;
        let mut best_delta = u16::MAX;
        for index in cell.index_range() {
            let delta = self.spans[index].top().abs_diff(top);
            if delta <= tolerance && delta < best_delta {
                best = Some(index);
                best_delta = delta;
            }
        }
        best
    }

    /// Copies every span that carries none of `flags` into `out`, preserving order.
    ///
    /// Returns the number of spans left out.
    pub fn compact_excluding(&self, flags: SpanFlags, out: &mut CompactSpanGrid) -> usize {
        out.reset(self.width, self.height);
        out.spans.reserve(self.spans.len());
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                for index in self.cell_at(x, y).index_range() {
                    let span = self.spans[index];
                    if !span.flags.intersects(flags) {
                        out.push_span(x, y, span);
                    }
                }
            }
        }
        self.spans.len() - out.spans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(bottom: u16, height: u16) -> CompactSpan {
        CompactSpan {
            bottom,
            height,
            ..Default::default()
        }
    }

    fn grid() -> CompactSpanGrid {
        let mut grid = CompactSpanGrid::default();
        grid.reset(3, 2);
        grid.push_span(0, 0, span(0, 2));
        grid.push_span(0, 0, span(5, 2));
        grid.push_span(2, 0, span(1, 1));
        grid.push_span(1, 1, span(3, 3));
        grid
    }

    #[test]
    fn cells_index_their_spans() {
        let grid = grid();
        assert_eq!(grid.cell_at(0, 0).index_range(), 0..2);
        assert!(grid.cell_at(1, 0).is_empty());
        assert_eq!(grid.cell_at(2, 0).index_range(), 2..3);
        assert_eq!(grid.cell_at(1, 1).index_range(), 3..4);
        assert_eq!(grid.cell(3, 0), None);
        assert_eq!(grid.cell(0, -1), None);
    }

    #[test]
    fn finds_nearest_span_within_tolerance() {
        let grid = grid();
        assert_eq!(grid.span_at(0, 0, 2, 0), Some(0));
        assert_eq!(grid.span_at(0, 0, 6, 1), Some(1));
        assert_eq!(grid.span_at(0, 0, 5, 1), None);
        // Both tops are in range, the closer one wins.
        assert_eq!(grid.span_at(0, 0, 5, 3), Some(1));
        assert_eq!(grid.span_at(1, 0, 0, 100), None);
        assert_eq!(grid.span_at(-1, 0, 0, 100), None);
    }

    #[test]
    fn compaction_drops_flagged_spans_in_order() {
        let mut grid = grid();
        grid.spans[1].flags = SpanFlags::NOT_WALKABLE;
        let mut compact = CompactSpanGrid::default();
        let dropped = grid.compact_excluding(SpanFlags::NOT_WALKABLE, &mut compact);
        assert_eq!(dropped, 1);
        assert_eq!(compact.spans.len(), 3);
        assert_eq!(compact.cell_at(0, 0).count(), 1);
        assert_eq!(compact.spans[0], span(0, 2));
        assert_eq!(compact.spans[1], span(1, 1));
        assert_eq!(compact.cell_at(1, 1).index(), 2);
    }
}
