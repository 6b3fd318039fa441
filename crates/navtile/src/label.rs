//! Per-span region labels. The low twelve bits hold a region index, the high four bits are flags.

use crate::compact_span_grid::CompactSpanGrid;

/// The region bits of a span that belongs to no region yet.
pub(crate) const NO_LABEL: u16 = 0x0FFF;
/// The span lies on the outer contour of its region.
pub(crate) const EXTERNAL_CONTOUR: u16 = 0x1000;
/// The span lies on the contour of a hole.
pub(crate) const INTERNAL_CONTOUR: u16 = 0x2000;
/// The span lies in the horizontal border band.
pub(crate) const BORDER_LABEL_H: u16 = 0x4000;
/// The span lies above or below the vertical extent of the tile.
pub(crate) const BORDER_LABEL_V: u16 = 0x8000;

#[inline]
pub(crate) fn is_border_label(label: u16) -> bool {
    label & (BORDER_LABEL_H | BORDER_LABEL_V) != 0
}

/// Returns `true` unless the span still has to be assigned a region.
#[inline]
pub(crate) fn is_labelled(label: u16) -> bool {
    label & NO_LABEL != NO_LABEL
}

impl CompactSpanGrid {
    /// Tags the labels of all spans in the border band.
    ///
    /// `top` is the tile height in voxels, the vertical band reaches `border_v` voxels beyond it on both ends.
    pub(crate) fn paint_border(&self, labels: &mut [u16], border_h: usize, border_v: usize, top: usize) {
        let width = self.width as usize;
        let height = self.height as usize;

        if border_h > 0 {
            for y in 0..height {
                for x in (0..border_h).chain(width - border_h..width) {
                    for index in self.cell_at(x, y).index_range() {
                        labels[index] |= BORDER_LABEL_H;
                    }
                }
            }
            for y in (0..border_h).chain(height - border_h..height) {
                for x in border_h..width - border_h {
                    for index in self.cell_at(x, y).index_range() {
                        labels[index] |= BORDER_LABEL_H;
                    }
                }
            }
        }

        if border_v > 0 {
            let max_top = border_v + top;
            for (label, span) in labels.iter_mut().zip(&self.spans) {
                let span_top = span.top() as usize;
                if span_top < border_v || span_top >= max_top {
                    *label |= BORDER_LABEL_V;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compact_span::CompactSpan;

    use super::*;

    #[test]
    fn border_band_is_tagged() {
        let mut grid = CompactSpanGrid::default();
        grid.reset(6, 6);
        for y in 0..6 {
            for x in 0..6 {
                let top = if x == 3 && y == 3 { 1 } else { 4 };
                grid.push_span(
                    x,
                    y,
                    CompactSpan {
                        bottom: top - 1,
                        height: 1,
                        ..Default::default()
                    },
                );
            }
        }
        grid.push_span(
            5,
            5,
            CompactSpan {
                bottom: 8,
                height: 1,
                ..Default::default()
            },
        );

        let mut labels = vec![NO_LABEL; grid.spans.len()];
        grid.paint_border(&mut labels, 1, 2, 4);
        let label = |x: usize, y: usize| labels[grid.cell_at(x, y).index() as usize];

        assert_eq!(label(0, 3), NO_LABEL | BORDER_LABEL_H);
        assert_eq!(label(5, 0), NO_LABEL | BORDER_LABEL_H);
        assert_eq!(label(2, 5), NO_LABEL | BORDER_LABEL_H);
        assert_eq!(label(2, 2), NO_LABEL);
        assert_eq!(label(3, 3), NO_LABEL | BORDER_LABEL_V);
        assert!(is_border_label(label(3, 3)));
        assert!(!is_labelled(label(3, 3)));
        // The upper span of (5, 5) reaches the top of the vertical band.
        assert_eq!(
            *labels.last().unwrap(),
            NO_LABEL | BORDER_LABEL_H | BORDER_LABEL_V
        );
    }
}
