use crate::span::SpanFlags;

/// A run of solid voxels in a [`CompactSpanGrid`](crate::CompactSpanGrid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CompactSpan {
    /// The lower extent of the span, measured from the grid's base. `[Units: vx]`
    pub bottom: u16,
    /// The vertical extent of the span. `[Units: vx]`
    pub height: u16,
    /// Water depth above the top of the span. `[Units: vx]`
    pub depth: u16,
    /// Filter results and voxelizer tags.
    pub flags: SpanFlags,
}

impl CompactSpan {
    /// The upper extent of the span, i.e. the floor an agent would stand on.
    #[inline]
    pub fn top(&self) -> u16 {
        self.bottom + self.height
    }

    /// Returns `true` if the span survived walkability filtering.
    #[inline]
    pub fn is_walkable(&self) -> bool {
        !self.flags.contains(SpanFlags::NOT_WALKABLE)
    }
}
