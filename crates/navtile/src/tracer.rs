//! Wall-following walk around a set of spans sharing a paint.

use glam::{IVec2, IVec3};

use crate::{
    compact_span_grid::CompactSpanGrid,
    label::NO_LABEL,
    math::{rot90_ccw, rot90_cw},
    paint::NO_PAINT,
};

/// One step of a contour walk.
///
/// The walked region is always on the tracer's right, the outside on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracer {
    /// Column and top of the current span.
    pub pos: IVec3,
    /// Walking direction, one of the four axis-aligned unit vectors.
    pub dir: IVec2,
    /// The span inside the contour.
    pub index_in: usize,
    /// The span outside the contour, if there is one.
    pub index_out: Option<usize>,
    /// A diagonal move was possible but the walk turned right instead.
    pub pinch: bool,
}

impl Tracer {
    /// Facing up the y-axis.
    pub(crate) const NORTH: IVec2 = IVec2::new(0, 1);

    #[inline]
    fn column(&self) -> IVec2 {
        self.pos.truncate()
    }

    #[inline]
    pub(crate) fn left(&self) -> IVec2 {
        self.column() + rot90_ccw(self.dir)
    }

    #[inline]
    pub(crate) fn front(&self) -> IVec2 {
        self.column() + self.dir
    }

    #[inline]
    pub(crate) fn front_left(&self) -> IVec2 {
        self.column() + self.dir + rot90_ccw(self.dir)
    }

    fn move_to(&mut self, neighbour: &NeighbourInfo) {
        self.pos = neighbour.pos.extend(neighbour.top as i32);
    }

    /// Returns `true` if both tracers stand on the same span facing the same way.
    #[inline]
    fn same_place(&self, other: &Tracer) -> bool {
        self.pos == other.pos && self.dir == other.dir
    }
}

/// A closed contour walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracerPath {
    /// The steps in walking order. The last step equals the start.
    pub steps: Vec<Tracer>,
    /// Right turns minus left turns. Positive for a clockwise walk around a region.
    pub turns: i32,
}

/// Constrains the paint of the spans a walk may step on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct NeighbourRequirements {
    /// The paint a span must have, unless [`NO_PAINT`].
    pub(crate) paint: u16,
    /// The paint a span must not have, unless [`NO_PAINT`].
    pub(crate) not_paint: u16,
}

impl NeighbourRequirements {
    pub(crate) fn with_paint(paint: u16) -> Self {
        Self {
            paint,
            not_paint: NO_PAINT,
        }
    }

    pub(crate) fn without_paint(not_paint: u16) -> Self {
        Self {
            paint: NO_PAINT,
            not_paint,
        }
    }
}

/// What a walk knows about an adjacent span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NeighbourInfo {
    pub(crate) pos: IVec2,
    pub(crate) top: u16,
    pub(crate) index: Option<usize>,
    pub(crate) label: u16,
    pub(crate) paint: u16,
}

impl NeighbourInfo {
    /// The span's index if it satisfies `requirements`.
    #[inline]
    pub(crate) fn check(&self, requirements: NeighbourRequirements) -> Option<usize> {
        self.index.filter(|_| {
            (requirements.paint == NO_PAINT || self.paint == requirements.paint)
                && (requirements.not_paint == NO_PAINT || self.paint != requirements.not_paint)
        })
    }
}

/// Everything a contour walk reads.
#[derive(Clone, Copy)]
pub(crate) struct TraceContext<'a> {
    pub(crate) grid: &'a CompactSpanGrid,
    pub(crate) paints: &'a [u16],
    pub(crate) climbable_height: u16,
}

impl TraceContext<'_> {
    /// Looks up the span at `pos` closest to `top`.
    pub(crate) fn assess(&self, labels: &[u16], pos: IVec2, top: u16) -> NeighbourInfo {
        match self.grid.span_at(pos.x, pos.y, top, self.climbable_height) {
            Some(index) => NeighbourInfo {
                pos,
                top: self.grid.spans[index].top(),
                index: Some(index),
                label: labels[index],
                paint: self.paints[index],
            },
            None => NeighbourInfo {
                pos,
                top,
                index: None,
                label: NO_LABEL,
                paint: NO_PAINT,
            },
        }
    }

    /// Walks along the boundary of the spans satisfying `requirements`, starting at `start`,
    /// until the walk returns to it.
    ///
    /// Returns `false` if the walk didn't close.
    pub(crate) fn trace(
        &self,
        labels: &[u16],
        start: Tracer,
        requirements: NeighbourRequirements,
        path: &mut TracerPath,
    ) -> bool {
        path.steps.clear();
        path.turns = 0;

        // Every span can be passed at most once per direction.
        let max_steps = self.grid.spans.len() * 4 + 4;
        let mut tracer = start;
        loop {
            tracer.pinch = false;
            let top = tracer.pos.z as u16;
            let left = self.assess(labels, tracer.left(), top);
            let front_left = self.assess(labels, tracer.front_left(), top);
            let front = self.assess(labels, tracer.front(), top);

            if let Some(index) = left.check(requirements) {
                tracing::warn!("Contour walk found its outside walkable at {}", left.pos);
                tracer.move_to(&left);
                tracer.index_in = index;
                tracer.index_out = Some(index);
            } else if let Some(front_index) = front.check(requirements) {
                if let Some(front_left_index) = front_left.check(requirements) {
                    tracer.move_to(&front_left);
                    tracer.dir = rot90_ccw(tracer.dir);
                    tracer.index_in = front_left_index;
                    tracer.index_out = left.index;
                    path.turns -= 1;
                } else {
                    tracer.move_to(&front);
                    tracer.index_in = front_index;
                    tracer.index_out = front_left.index;
                }
            } else {
                tracer.pinch = front_left.check(requirements).is_some();
                tracer.dir = rot90_cw(tracer.dir);
                tracer.index_out = front.index;
                path.turns += 1;
            }

            path.steps.push(tracer);
            if tracer.same_place(&start) {
                return true;
            }
            if path.steps.len() >= max_steps {
                tracing::warn!(
                    "Contour walk starting at {} did not close after {} steps",
                    start.pos,
                    path.steps.len()
                );
                return false;
            }
        }
    }
}
