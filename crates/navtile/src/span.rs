use slotmap::SlotMap;

slotmap::new_key_type! {
    /// A key for a span in a [`DynamicSpanGrid`](crate::DynamicSpanGrid).
    pub struct SpanKey;
}

bitflags::bitflags! {
    /// Per-span flags, shared by the dynamic and the compact grid.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    pub struct SpanFlags: u8 {
        /// The top surface of the span was produced by a downward facing triangle.
        const BACKFACE = 1 << 0;
        /// The span was rejected by the walkability filter.
        const NOT_WALKABLE = 1 << 1;
        /// The span lies in the border band around the tile.
        const TILE_BOUNDARY = 1 << 2;
    }
}

impl Default for SpanFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Slot map backing the linked span lists of a [`DynamicSpanGrid`](crate::DynamicSpanGrid).
#[derive(Debug, Clone, Default)]
pub(crate) struct Spans(SlotMap<SpanKey, Span>);

impl std::ops::Deref for Spans {
    type Target = SlotMap<SpanKey, Span>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for Spans {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Spans {
    const DEFAULT_CAPACITY: usize = 1024;

    pub(crate) fn with_min_capacity(min_capacity: usize) -> Self {
        let capacity = min_capacity.max(Self::DEFAULT_CAPACITY);
        Self(SlotMap::with_capacity_and_key(capacity))
    }
}

pub(crate) struct SpanBuilder {
    pub(crate) min: u16,
    pub(crate) max: u16,
    pub(crate) flags: SpanFlags,
    pub(crate) next: Option<SpanKey>,
}

impl SpanBuilder {
    pub(crate) fn build(self) -> Span {
        Span {
            min: self.min,
            max: self.max,
            flags: self.flags,
            depth: 0,
            next: self.next,
        }
    }
}

impl From<SpanBuilder> for Span {
    fn from(builder: SpanBuilder) -> Self {
        builder.build()
    }
}

/// A run of solid voxels `[min, max)` in one column of a [`DynamicSpanGrid`](crate::DynamicSpanGrid).
/// Build with [`SpanBuilder`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Span {
    /// Bottom of the solid run.
    min: u16,
    /// Top of the solid run, i.e. the floor an agent would stand on.
    max: u16,
    flags: SpanFlags,
    /// Water depth above the top, in voxels.
    depth: u16,
    /// The key of the next-higher span in the column
    next: Option<SpanKey>,
}

impl Span {
    #[inline]
    pub(crate) fn min(&self) -> u16 {
        self.min
    }

    #[inline]
    pub(crate) fn set_min(&mut self, min: u16) {
        self.min = min;
    }

    #[inline]
    pub(crate) fn max(&self) -> u16 {
        self.max
    }

    #[inline]
    pub(crate) fn set_max(&mut self, max: u16) {
        self.max = max;
    }

    #[inline]
    pub(crate) fn flags(&self) -> SpanFlags {
        self.flags
    }

    #[inline]
    pub(crate) fn set_flags(&mut self, flags: SpanFlags) {
        self.flags = flags;
    }

    #[inline]
    pub(crate) fn depth(&self) -> u16 {
        self.depth
    }

    #[inline]
    pub(crate) fn set_depth(&mut self, depth: u16) {
        self.depth = depth;
    }

    #[inline]
    pub(crate) fn next(&self) -> Option<SpanKey> {
        self.next
    }

    #[inline]
    pub(crate) fn set_next(&mut self, next: impl Into<Option<SpanKey>>) {
        self.next = next.into();
    }
}
