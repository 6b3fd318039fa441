//! The dynamic span grid the voxelizer rasterizes into.
//!
//! Each column holds a bottom-to-top linked list of solid [`Span`]s.
//! Overlapping insertions are merged.

use thiserror::Error;

use crate::{
    compact_span::CompactSpan,
    compact_span_grid::CompactSpanGrid,
    math::Aabb3d,
    span::{Span, SpanFlags, SpanKey, Spans},
};
use glam::Vec3;

/// A grid of voxel columns holding linked lists of solid spans.
/// Build with [`SpanGridBuilder`].
#[derive(Debug, Clone)]
pub struct DynamicSpanGrid {
    /// The width of the grid along the x-axis in cell units
    pub width: u16,
    /// The height of the grid along the y-axis in cell units
    pub height: u16,
    /// The world space box covered by the grid
    pub aabb: Aabb3d,
    /// The size of a voxel along each axis
    pub voxel_size: Vec3,
    /// The key of the lowest span of every column, in `width * height` order
    pub(crate) columns: Vec<Option<SpanKey>>,
    pub(crate) allocated_spans: Spans,
}

impl DynamicSpanGrid {
    /// Inserts a span, merging it with every span of the column it overlaps.
    ///
    /// The merged span takes the flags of whichever span reaches higher.
    pub(crate) fn add_span(&mut self, insertion: SpanInsertion) -> Result<(), SpanInsertionError> {
        let column_index = self.column_index(insertion.x, insertion.y);
        if insertion.x >= self.width || column_index >= self.columns.len() {
            return Err(SpanInsertionError::ColumnIndexOutOfBounds {
                x: insertion.x,
                y: insertion.y,
            });
        }

        let mut new_span = insertion.span;
        let mut previous_span_key = None;
        let mut current_span_key_iter = self.columns[column_index];
        while let Some(current_span_key) = current_span_key_iter {
            let current_span = self.span(current_span_key);
            current_span_key_iter = current_span.next();
            if current_span.min() > new_span.max() {
                // Current span is completely above the new span, break.
                break;
            }
            if current_span.max() < new_span.min() {
                // Current span is completely below the new span. Keep going.
                previous_span_key.replace(current_span_key);
                continue;
            }
            // The new span overlaps with an existing span. Merge them.
            if current_span.min() < new_span.min() {
                new_span.set_min(current_span.min());
            }
            if current_span.max() > new_span.max() {
                new_span.set_max(current_span.max());
                new_span.set_flags(current_span.flags());
            }

            // Remove the current span since it's now merged with new_span.
            // Keep going because there might be other overlapping spans that also need to be merged.
            let next_key = current_span.next();
            self.allocated_spans.remove(current_span_key);
            if let Some(previous_span_key) = previous_span_key {
                self.span_mut(previous_span_key).set_next(next_key);
            } else {
                self.columns[column_index] = next_key;
            }
        }

        if let Some(previous_span_key) = previous_span_key {
            new_span.set_next(self.span(previous_span_key).next());
            let new_span_key = self.allocated_spans.insert(new_span);
            self.span_mut(previous_span_key).set_next(new_span_key);
        } else {
            let lowest_span_key = self.columns[column_index];
            new_span.set_next(lowest_span_key);
            let new_span_key = self.allocated_spans.insert(new_span);
            self.columns[column_index] = Some(new_span_key);
        }

        Ok(())
    }

    #[inline]
    pub(crate) fn column_index(&self, x: u16, y: u16) -> usize {
        x as usize + y as usize * self.width as usize
    }

    /// The number of spans in the grid.
    #[inline]
    pub fn span_count(&self) -> usize {
        self.allocated_spans.len()
    }

    /// Returns the key of the lowest span in the column at the given coordinates.
    /// `None` if either the index is out of bounds or there is no span in the column.
    #[inline]
    pub fn span_key_at(&self, x: u16, y: u16) -> Option<SpanKey> {
        if x >= self.width {
            return None;
        }
        *self.columns.get(self.column_index(x, y))?
    }

    /// Iterates over the spans of a column, bottom to top.
    pub(crate) fn column(&self, x: u16, y: u16) -> impl Iterator<Item = (SpanKey, &Span)> + '_ {
        let mut key_iter = self.span_key_at(x, y);
        std::iter::from_fn(move || {
            let key = key_iter?;
            let span = self.span(key);
            key_iter = span.next();
            Some((key, span))
        })
    }

    /// Returns a reference to the span with the given key.
    /// # Panics
    /// Panics if the key is not found.
    #[inline]
    pub(crate) fn span(&self, key: SpanKey) -> &Span {
        &self.allocated_spans[key]
    }

    /// Returns a mutable reference to the span with the given key.
    /// # Panics
    /// Panics if the key is not found.
    #[inline]
    pub(crate) fn span_mut(&mut self, key: SpanKey) -> &mut Span {
        &mut self.allocated_spans[key]
    }

    /// Packs every span of the grid into `out`, column by column.
    pub fn compact_into(&self, out: &mut CompactSpanGrid) {
        out.reset(self.width, self.height);
        out.spans.reserve(self.span_count());
        for y in 0..self.height {
            for x in 0..self.width {
                for (_, span) in self.column(x, y) {
                    out.push_span(
                        x as usize,
                        y as usize,
                        CompactSpan {
                            bottom: span.min(),
                            height: span.max() - span.min(),
                            depth: span.depth(),
                            flags: span.flags() & SpanFlags::BACKFACE,
                        },
                    );
                }
            }
        }
    }
}

/// A builder for [`DynamicSpanGrid`]s.
pub struct SpanGridBuilder {
    /// The world space box covered by the grid
    pub aabb: Aabb3d,
    /// The size of a voxel along each axis
    pub voxel_size: Vec3,
}

impl SpanGridBuilder {
    /// Builds the grid.
    pub fn build(self) -> Result<DynamicSpanGrid, SpanGridError> {
        let size = self.aabb.size();
        if !self.aabb.is_valid() || self.voxel_size.cmple(Vec3::ZERO).any() {
            return Err(SpanGridError::InvalidDimensions {
                size,
                voxel_size: self.voxel_size,
            });
        }
        let width = size.x / self.voxel_size.x + 0.5;
        let height = size.y / self.voxel_size.y + 0.5;
        let layers = size.z / self.voxel_size.z + 0.5;
        if width >= u16::MAX as f32 || height >= u16::MAX as f32 || layers >= u16::MAX as f32 {
            return Err(SpanGridError::TooLarge {
                width,
                height,
                layers,
            });
        }
        let column_count = width as usize * height as usize;
        Ok(DynamicSpanGrid {
            width: width as u16,
            height: height as u16,
            aabb: self.aabb,
            voxel_size: self.voxel_size,
            columns: vec![None; column_count],
            allocated_spans: Spans::with_min_capacity(column_count),
        })
    }
}

/// Errors that can occur when building a [`DynamicSpanGrid`] with [`SpanGridBuilder::build`].
#[derive(Error, Debug)]
pub enum SpanGridError {
    /// The box is inverted or a voxel size component is not positive.
    #[error("Cannot build a span grid over a box of size {size} with voxel size {voxel_size}")]
    InvalidDimensions {
        /// The size of the box
        size: Vec3,
        /// The voxel size
        voxel_size: Vec3,
    },
    /// The grid would not be addressable with 16-bit coordinates.
    #[error("Span grid is too large, got {width}x{height}x{layers} voxels but max is {max} per axis", max = u16::MAX)]
    TooLarge {
        /// The width of the grid along the x-axis in cell units
        width: f32,
        /// The height of the grid along the y-axis in cell units
        height: f32,
        /// The number of voxel layers along the z-axis
        layers: f32,
    },
}

/// Errors that can occur when inserting a span into a [`DynamicSpanGrid`].
#[derive(Error, Debug)]
pub enum SpanInsertionError {
    /// Happens when the column index is out of bounds.
    #[error("column index out of bounds: x={x}, y={y}")]
    ColumnIndexOutOfBounds {
        /// The x-coordinate of the span
        x: u16,
        /// The y-coordinate of the span
        y: u16,
    },
}

pub(crate) struct SpanInsertion {
    /// The x-coordinate of the span
    pub(crate) x: u16,
    /// The y-coordinate of the span
    pub(crate) y: u16,
    /// The span to insert
    pub(crate) span: Span,
}
