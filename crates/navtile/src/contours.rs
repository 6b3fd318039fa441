//! Splits the painted spans into regions and traces their outlines.

use glam::{IVec2, IVec3};

use crate::{
    border::BorderBand,
    compact_span_grid::CompactSpanGrid,
    label::{
        BORDER_LABEL_H, BORDER_LABEL_V, EXTERNAL_CONTOUR, INTERNAL_CONTOUR, NO_LABEL, is_labelled,
    },
    math::dist_point_to_segment_sq,
    paint::{NO_PAINT, OK_PAINT_START},
    tracer::{NeighbourRequirements, TraceContext, Tracer, TracerPath},
};

bitflags::bitflags! {
    /// Flags for a [`ContourVertex`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ContourVertexFlags: u8 {
        /// The vertex lies on the horizontal tile boundary and must line up with the neighbouring tile.
        const TILE_BOUNDARY = 1 << 0;
        /// The vertex touches the vertical border band.
        const TILE_BOUNDARY_V = 1 << 1;
        /// Removing the vertex would change the shape of the walkable area.
        const UNREMOVABLE = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Flags for a [`Region`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegionFlags: u8 {
        /// Some contour vertex lies on the horizontal tile boundary.
        const TILE_BOUNDARY = 1 << 0;
        /// Some contour vertex touches the vertical border band.
        const TILE_BOUNDARY_V = 1 << 1;
    }
}

/// A corner of a traced contour, in voxel coordinates of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContourVertex {
    /// Column corner x. `[Units: vx]`
    pub x: u16,
    /// Column corner y. `[Units: vx]`
    pub y: u16,
    /// Height above the grid base. `[Units: vx]`
    pub z: u16,
    /// Classification of the vertex.
    pub flags: ContourVertexFlags,
}

impl ContourVertex {
    /// Returns `true` if simplification may drop the vertex.
    #[inline]
    pub fn is_removable(&self) -> bool {
        !self
            .flags
            .intersects(ContourVertexFlags::TILE_BOUNDARY | ContourVertexFlags::UNREMOVABLE)
    }

    #[inline]
    pub(crate) fn position(&self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }
}

/// A closed outline.
pub type Contour = Vec<ContourVertex>;

/// A connected set of spans sharing a paint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Region {
    /// The outer outline, clockwise.
    pub contour: Contour,
    /// Outlines of the areas inside the region that belong to other paints.
    pub holes: Vec<Contour>,
    /// The number of spans labelled with the region.
    pub span_count: usize,
    /// The paint shared by the region's spans.
    pub paint: u16,
    /// Whether the region reaches the tile boundary.
    pub flags: RegionFlags,
}

/// Squared distance under which a contour vertex counts as lying on the line through its neighbours.
const COLLINEAR_THRESHOLD_SQ: f32 = 0.015;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NeighbourClass {
    Unwalkable = 0,
    Walkable = 1,
    WalkableBorder = 2,
}

const UW: usize = NeighbourClass::Unwalkable as usize;
const NB: usize = NeighbourClass::Walkable as usize;
const WB: usize = NeighbourClass::WalkableBorder as usize;

/// Unremovable corners, indexed by the classes of left, front-left and front.
const CORNER_TABLE: [[[bool; 3]; 3]; 3] = {
    let mut table = [[[false; 3]; 3]; 3];
    table[UW][UW][WB] = true;
    table[UW][WB][UW] = true;
    table[UW][WB][NB] = true;
    table[UW][WB][WB] = true;
    table[NB][UW][WB] = true;
    table[NB][WB][UW] = true;
    table[WB][UW][UW] = true;
    table[WB][UW][NB] = true;
    table[WB][NB][WB] = true;
    table[WB][WB][UW] = true;
    table
};

const PINCH_EXTERNAL: u8 = 1 << 0;
const PINCH_INTERNAL: u8 = 1 << 1;

/// Pinch points, indexed like [`CORNER_TABLE`]. Bits tell which contour kind they apply to.
const PINCH_TABLE: [[[u8; 3]; 3]; 3] = {
    let both = PINCH_EXTERNAL | PINCH_INTERNAL;
    let mut table = [[[0; 3]; 3]; 3];
    table[UW][NB][UW] = both;
    table[UW][NB][WB] = PINCH_EXTERNAL;
    table[UW][WB][UW] = both;
    table[UW][WB][NB] = PINCH_INTERNAL;
    table[NB][UW][NB] = PINCH_INTERNAL;
    table[NB][WB][UW] = PINCH_INTERNAL;
    table[NB][WB][NB] = PINCH_INTERNAL;
    table[WB][UW][WB] = PINCH_EXTERNAL;
    table[WB][NB][UW] = PINCH_EXTERNAL;
    table[WB][NB][WB] = PINCH_EXTERNAL;
    table
};

const D1: usize = 0;
const SP: usize = 1;
const D2: usize = 2;

/// Paint pinches, indexed by paint classes of left, front-left and front.
/// [`SP`] is the paint of the contour span, [`D1`] and [`D2`] are two other paints.
const PAINT_PINCH_TABLE: [[[bool; 3]; 3]; 3] = [
    [
        [false, false, true],
        [true, false, true],
        [true, true, true],
    ],
    [
        [false, true, true],
        [false, false, false],
        [true, true, false],
    ],
    [
        [true, true, true],
        [true, false, true],
        [true, false, false],
    ],
];

/// Returns `true` if the paints around a vertex would let two different areas touch diagonally.
fn is_paint_pinch_point(paint: u16, left: u16, front_left: u16, front: u16) -> bool {
    let mut different = D1;
    let left_class = if left == paint { SP } else { different };
    let front_left_class = if front_left == paint {
        SP
    } else if front_left == left {
        left_class
    } else {
        different ^= D2;
        different
    };
    let front_class = if front == paint {
        SP
    } else if front == front_left {
        front_left_class
    } else {
        different ^= D2;
        different
    };
    PAINT_PINCH_TABLE[left_class][front_left_class][front_class]
}

/// A span touching a contour vertex.
#[derive(Debug, Clone, Copy)]
struct Surrounding {
    index: Option<usize>,
    label: u16,
    walkable: bool,
}

impl Surrounding {
    fn class(&self) -> usize {
        if !self.walkable {
            UW
        } else if self.label & (BORDER_LABEL_H | BORDER_LABEL_V) != 0 {
            WB
        } else {
            NB
        }
    }
}

/// Packs a per-neighbour predicate into bits: 0 = left, 1 = front-left, 2 = front.
fn neighbour_bits(neighbours: &[Surrounding; 3], predicate: impl Fn(&Surrounding) -> bool) -> u8 {
    neighbours
        .iter()
        .enumerate()
        .fold(0, |bits, (i, n)| bits | (predicate(n) as u8) << i)
}

/// Appends a vertex, replacing the previous one if it is removable and on the line to the new one.
pub(crate) fn add_contour_vertex(contour: &mut Contour, vertex: ContourVertex, flags: &mut RegionFlags) {
    match contour.as_mut_slice() {
        [.., left, middle]
            if middle.is_removable()
                && dist_point_to_segment_sq(middle.position(), left.position(), vertex.position())
                    <= COLLINEAR_THRESHOLD_SQ =>
        {
            *middle = vertex;
        }
        _ => contour.push(vertex),
    }
    if vertex.flags.contains(ContourVertexFlags::TILE_BOUNDARY) {
        *flags |= RegionFlags::TILE_BOUNDARY;
    }
    if vertex.flags.contains(ContourVertexFlags::TILE_BOUNDARY_V) {
        *flags |= RegionFlags::TILE_BOUNDARY_V;
    }
}

/// Applies the collinearity test across the seam where the contour closes.
pub(crate) fn tidy_up_contour_end(contour: &mut Contour) {
    let collinear = |left: &ContourVertex, middle: &ContourVertex, right: &ContourVertex| {
        middle.is_removable()
            && dist_point_to_segment_sq(middle.position(), left.position(), right.position())
                <= COLLINEAR_THRESHOLD_SQ
    };

    if let [first, .., left, middle] = contour.as_slice() {
        if contour.len() > 2 && collinear(left, middle, first) {
            contour.pop();
        }
    }
    if let [middle, right, .., last] = contour.as_slice() {
        if contour.len() > 2 && collinear(last, middle, right) {
            if let Some(last) = contour.pop() {
                contour[0] = last;
            }
        }
    }
}

/// Drops small regions that don't reach the tile boundary and carry the default paint.
pub(crate) fn filter_bad_regions(regions: &mut [Region], min_span_count: usize) {
    for region in regions {
        let boundary = region
            .flags
            .intersects(RegionFlags::TILE_BOUNDARY | RegionFlags::TILE_BOUNDARY_V);
        if !boundary
            && region.span_count > 0
            && region.span_count <= min_span_count
            && region.paint <= OK_PAINT_START
        {
            *region = Region::default();
        }
    }
}

/// The inputs of region labelling.
pub(crate) struct ContourExtraction<'a> {
    pub(crate) grid: &'a CompactSpanGrid,
    pub(crate) distances: &'a [u16],
    pub(crate) paints: &'a [u16],
    pub(crate) band: BorderBand,
    /// Height of the vertical border band in voxels.
    pub(crate) border_v: u16,
    /// Height of the tile in voxels.
    pub(crate) top: u16,
    pub(crate) erosion: u16,
    pub(crate) climbable_height: u16,
}

impl ContourExtraction<'_> {
    fn context(&self) -> TraceContext<'_> {
        TraceContext {
            grid: self.grid,
            paints: self.paints,
            climbable_height: self.climbable_height,
        }
    }

    fn paint_of(&self, index: Option<usize>) -> u16 {
        index.map_or(NO_PAINT, |index| self.paints[index])
    }

    /// Scans the tile in row order, starting a new region wherever the paint changes,
    /// and traces the outline of every region and hole it finds.
    ///
    /// `labels` must hold the border labels on entry.
    pub(crate) fn extract(
        &self,
        labels: &mut [u16],
        regions: &mut Vec<Region>,
        mut tracer_paths: Option<&mut Vec<TracerPath>>,
    ) {
        regions.clear();
        let context = self.context();
        let mut path = TracerPath::default();
        let border = self.band.size as usize;
        let mut cache = |path: &TracerPath| {
            if let Some(paths) = tracer_paths.as_deref_mut() {
                paths.push(path.clone());
            }
        };

        for y in border..self.grid.height as usize - border {
            for x in border..self.grid.width as usize - border {
                for index in self.grid.cell_at(x, y).index_range() {
                    let label = labels[index];
                    // Already reached by an earlier walk.
                    if is_labelled(label) {
                        continue;
                    }
                    let paint = self.paints[index];
                    let top = self.grid.spans[index].top();
                    let prev = context.assess(labels, IVec2::new(x as i32 - 1, y as i32), top);
                    let prev_region = (prev.label & NO_LABEL) as usize;

                    let walkable = paint >= OK_PAINT_START;
                    let prev_walkable = prev.paint >= OK_PAINT_START;
                    let start = Tracer {
                        pos: IVec3::new(x as i32, y as i32, top as i32),
                        dir: Tracer::NORTH,
                        index_in: index,
                        index_out: prev.index,
                        pinch: false,
                    };
                    let may_open_hole = prev.label & EXTERNAL_CONTOUR == 0
                        && label & INTERNAL_CONTOUR == 0;

                    if walkable && prev_walkable && paint == prev.paint {
                        if let Some(region) = regions.get_mut(prev_region) {
                            labels[index] = prev_region as u16;
                            region.span_count += 1;
                        }
                        continue;
                    }

                    if walkable {
                        let closed = context.trace(
                            labels,
                            start,
                            NeighbourRequirements::with_paint(paint),
                            &mut path,
                        );
                        // Negative turns mean the walk went around a hole before the region around it was found.
                        if !closed || path.turns <= 0 {
                            continue;
                        }
                        if regions.len() >= NO_LABEL as usize {
                            tracing::warn!(
                                "Too many regions in a single tile, ignoring the region at ({}, {})",
                                x,
                                y
                            );
                            continue;
                        }
                        cache(&path);
                        let new_label = regions.len() as u16;
                        let mut region = Region {
                            paint,
                            ..Default::default()
                        };
                        let (contour, steps) = self.label_tracer_path(
                            labels,
                            &path,
                            &mut region.flags,
                            new_label,
                            EXTERNAL_CONTOUR,
                            NO_LABEL,
                        );
                        region.contour = contour;
                        region.span_count += steps;
                        regions.push(region);

                        if !prev_walkable {
                            continue;
                        }
                    } else if !prev_walkable {
                        continue;
                    }

                    // The previous span's region surrounds this one.
                    if !may_open_hole {
                        continue;
                    }
                    if prev_region >= regions.len() {
                        if walkable {
                            tracing::warn!(
                                "Contour tracing wanted to create a hole in an unknown region at ({}, {})",
                                x,
                                y
                            );
                        }
                        continue;
                    }
                    if !context.trace(
                        labels,
                        start,
                        NeighbourRequirements::without_paint(prev.paint),
                        &mut path,
                    ) {
                        continue;
                    }
                    let mut flags = regions[prev_region].flags;
                    let (hole, _) = self.label_tracer_path(
                        labels,
                        &path,
                        &mut flags,
                        NO_LABEL,
                        INTERNAL_CONTOUR,
                        prev.label,
                    );
                    let region = &mut regions[prev_region];
                    region.flags = flags;
                    region.holes.push(hole);
                    cache(&path);
                }
            }
        }
    }

    /// Converts a walk into a contour and labels the spans along it.
    ///
    /// Spans inside get `internal_label` (unless [`NO_LABEL`]) and `label_flags`,
    /// spans outside get `external_label` (unless [`NO_LABEL`]) if they don't belong to an outline already.
    /// Returns the contour and the number of steps.
    fn label_tracer_path(
        &self,
        labels: &mut [u16],
        path: &TracerPath,
        region_flags: &mut RegionFlags,
        internal_label: u16,
        label_flags: u16,
        external_label: u16,
    ) -> (Contour, usize) {
        let steps = &path.steps;
        let internal = label_flags & INTERNAL_CONTOUR != 0;
        let mut contour = Contour::with_capacity(steps.len());

        for (i, next) in steps.iter().enumerate() {
            let current = &steps[(i + steps.len() - 1) % steps.len()];
            let mut vertex = self.determine_contour_vertex(labels, current, internal);
            if next.pinch && !vertex.flags.contains(ContourVertexFlags::UNREMOVABLE) {
                tracing::warn!(
                    "Removable pinch point at tracer position {}, forcing it unremovable",
                    current.pos
                );
                vertex.flags |= ContourVertexFlags::UNREMOVABLE;
            }
            add_contour_vertex(&mut contour, vertex, region_flags);

            if internal_label != NO_LABEL {
                labels[current.index_in] = internal_label;
            }
            labels[current.index_in] |= label_flags;
            if external_label != NO_LABEL {
                if let Some(out) = current.index_out {
                    // Established outer outlines stay.
                    if labels[out] & EXTERNAL_CONTOUR == 0 {
                        labels[out] = external_label;
                    }
                }
            }
        }

        tidy_up_contour_end(&mut contour);
        (contour, steps.len())
    }

    /// Places the contour vertex at the corner ahead-left of a tracer step and classifies it.
    fn determine_contour_vertex(&self, labels: &[u16], tracer: &Tracer, internal: bool) -> ContourVertex {
        let dir = tracer.dir;
        let x_offset = (dir.x == 1 || dir.y == -1) as i32;
        let y_offset = (dir.y == 1 || dir.x == 1) as i32;
        let cx = tracer.pos.x + x_offset;
        let cy = tracer.pos.y + y_offset;
        let top = tracer.pos.z as u16;
        let v_limit = self.border_v + self.top;

        let current =
            self.grid
                .span_at(tracer.pos.x, tracer.pos.y, top, self.climbable_height);
        let internal_border_v = current.is_some_and(|index| labels[index] & BORDER_LABEL_V != 0);

        let mut cz = top;
        let mut surrounding = |pos: IVec2| match self.grid.span_at(
            pos.x,
            pos.y,
            top,
            self.climbable_height,
        ) {
            Some(index) => {
                cz = cz.max(self.grid.spans[index].top());
                Surrounding {
                    index: Some(index),
                    label: labels[index],
                    walkable: self.distances[index] >= self.erosion,
                }
            }
            None => Surrounding {
                index: None,
                label: NO_LABEL,
                walkable: false,
            },
        };
        let front = surrounding(tracer.front());
        let front_left = surrounding(tracer.front_left());
        let left = surrounding(tracer.left());
        let mut cz = cz.min(v_limit);

        let neighbours = [left, front_left, front];
        let walkable_bits = neighbour_bits(&neighbours, |n| n.walkable);
        let border_bits_h = neighbour_bits(&neighbours, |n| n.label & BORDER_LABEL_H != 0);
        let border_bits_v = neighbour_bits(&neighbours, |n| n.label & BORDER_LABEL_V != 0);
        let border_bits = border_bits_h | border_bits_v;
        let [l, fl, f] = neighbours.map(|n| n.class());
        let corner = CORNER_TABLE[l][fl][f];
        let border_change = border_bits == 7 && border_bits_h != 0 && border_bits_v != 0;

        let mut flags = ContourVertexFlags::empty();

        if self.band.is_corner_vertex(cx, cy) {
            flags |= ContourVertexFlags::TILE_BOUNDARY;
        } else if self.band.is_boundary_vertex(cx, cy) {
            let front_cell = tracer.front();
            let front_boundary = self.band.is_boundary_cell(front_cell.x, front_cell.y)
                || self.band.is_border_cell(front_cell.x, front_cell.y);
            let connection = border_bits_h == 7 && walkable_bits != 0;
            if front_boundary && connection {
                flags |= ContourVertexFlags::TILE_BOUNDARY;
            }
            if corner || border_change {
                flags |= ContourVertexFlags::UNREMOVABLE;
            }
        }

        if border_bits_v != 0 || internal_border_v {
            flags |= ContourVertexFlags::TILE_BOUNDARY_V;
            // Neighbours belonging to different borders.
            let mixed_borders = border_bits_h & ((border_bits_v << 1) | (border_bits_v >> 1)) != 0;
            if !internal_border_v && (corner || border_change || mixed_borders) {
                flags |= ContourVertexFlags::UNREMOVABLE;
            }
            if cz < v_limit {
                cz = self.border_v;
            }
        }

        let pinch_mask = if internal {
            PINCH_INTERNAL
        } else {
            PINCH_EXTERNAL
        };
        if PINCH_TABLE[l][fl][f] & pinch_mask != 0
            || is_paint_pinch_point(
                self.paint_of(current),
                self.paint_of(left.index),
                self.paint_of(front_left.index),
                self.paint_of(front.index),
            )
        {
            flags |= ContourVertexFlags::UNREMOVABLE;
        }

        ContourVertex {
            x: cx as u16,
            y: cy as u16,
            z: cz,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{compact_span::CompactSpan, paint::BAD_PAINT};

    use super::*;

    fn vertex(x: u16, y: u16, flags: ContourVertexFlags) -> ContourVertex {
        ContourVertex { x, y, z: 0, flags }
    }

    struct Fixture {
        grid: CompactSpanGrid,
        distances: Vec<u16>,
        paints: Vec<u16>,
        labels: Vec<u16>,
    }

    /// A flat grid without border band. `#` is walkable, `x` is painted bad, `.` is empty.
    fn fixture(rows: &[&str]) -> Fixture {
        let height = rows.len() as u16;
        let width = rows[0].len() as u16;
        let mut grid = CompactSpanGrid::default();
        let mut paints = vec![];
        grid.reset(width, height);
        for (y, row) in rows.iter().rev().enumerate() {
            for (x, c) in row.chars().enumerate() {
                let paint = match c {
                    '#' => OK_PAINT_START,
                    'x' => BAD_PAINT,
                    _ => continue,
                };
                grid.push_span(
                    x,
                    y,
                    CompactSpan {
                        bottom: 4,
                        height: 1,
                        ..Default::default()
                    },
                );
                paints.push(paint);
            }
        }
        let distances = vec![10; grid.spans.len()];
        let labels = vec![NO_LABEL; grid.spans.len()];
        Fixture {
            grid,
            distances,
            paints,
            labels,
        }
    }

    fn extract(fixture: &mut Fixture) -> Vec<Region> {
        let extraction = ContourExtraction {
            grid: &fixture.grid,
            distances: &fixture.distances,
            paints: &fixture.paints,
            band: BorderBand::new(0, fixture.grid.width, fixture.grid.height),
            border_v: 0,
            top: 20,
            erosion: 0,
            climbable_height: 1,
        };
        let mut regions = vec![];
        extraction.extract(&mut fixture.labels, &mut regions, None);
        regions
    }

    fn corners(contour: &Contour) -> Vec<(u16, u16)> {
        contour.iter().map(|v| (v.x, v.y)).collect()
    }

    #[test]
    fn collinear_vertices_collapse() {
        let mut contour = vec![];
        let mut flags = RegionFlags::empty();
        for x in 0..5 {
            add_contour_vertex(&mut contour, vertex(x, 0, ContourVertexFlags::empty()), &mut flags);
        }
        assert_eq!(corners(&contour), [(0, 0), (4, 0)]);

        add_contour_vertex(&mut contour, vertex(4, 3, ContourVertexFlags::TILE_BOUNDARY), &mut flags);
        add_contour_vertex(&mut contour, vertex(4, 5, ContourVertexFlags::empty()), &mut flags);
        assert_eq!(corners(&contour), [(0, 0), (4, 0), (4, 3), (4, 5)]);
        assert!(flags.contains(RegionFlags::TILE_BOUNDARY));
    }

    #[test]
    fn tidy_up_closes_the_seam() {
        let mut contour: Contour = [(0, 1), (0, 4), (4, 4), (4, 0), (0, 0)]
            .map(|(x, y)| vertex(x, y, ContourVertexFlags::empty()))
            .to_vec();
        contour[1].flags = ContourVertexFlags::UNREMOVABLE;
        contour[2].flags = ContourVertexFlags::UNREMOVABLE;
        contour[3].flags = ContourVertexFlags::UNREMOVABLE;
        contour[4].flags = ContourVertexFlags::UNREMOVABLE;
        tidy_up_contour_end(&mut contour);
        assert_eq!(corners(&contour), [(0, 0), (0, 4), (4, 4), (4, 0)]);
    }

    #[test]
    fn paint_pinches() {
        let (a, b, c) = (2, 3, 4);
        assert!(!is_paint_pinch_point(a, a, a, a));
        assert!(!is_paint_pinch_point(a, b, b, b));
        // Another paint touches the vertex diagonally only.
        assert!(is_paint_pinch_point(a, a, b, a));
        // Three paints meet.
        assert!(is_paint_pinch_point(a, b, c, a));
    }

    #[test]
    fn traces_a_block_to_its_corners() {
        let mut fixture = fixture(&["######"; 6]);
        let regions = extract(&mut fixture);
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(corners(&region.contour), [(0, 0), (0, 6), (6, 6), (6, 0)]);
        assert!(region.contour.iter().all(|v| v.z == 5));
        assert!(region.flags.contains(RegionFlags::TILE_BOUNDARY));
        assert!(region.holes.is_empty());
        assert!(fixture.labels.iter().all(|label| label & NO_LABEL == 0));
    }

    #[test]
    fn finds_holes() {
        let mut fixture = fixture(&[
            "#######", "#######", "#######", "###x###", "#######", "#######", "#######",
        ]);
        let regions = extract(&mut fixture);
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.holes.len(), 1);
        let mut hole = corners(&region.holes[0]);
        hole.sort();
        assert_eq!(hole, [(3, 3), (3, 4), (4, 3), (4, 4)]);
        let hole_span = fixture.grid.cell_at(3, 3).index() as usize;
        assert_ne!(fixture.labels[hole_span] & INTERNAL_CONTOUR, 0);
    }

    #[test]
    fn separate_paints_become_separate_regions() {
        let mut fixture = fixture(&["######"; 4]);
        for y in 0..4 {
            for x in 3..6 {
                let index = fixture.grid.cell_at(x, y).index() as usize;
                fixture.paints[index] = OK_PAINT_START + 1;
            }
        }
        let regions = extract(&mut fixture);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].paint, OK_PAINT_START);
        assert_eq!(regions[1].paint, OK_PAINT_START + 1);
        assert_eq!(corners(&regions[1].contour).len(), 4);
    }

    #[test]
    fn small_inner_regions_are_filtered() {
        let mut regions = vec![
            Region {
                span_count: 3,
                paint: OK_PAINT_START,
                ..Default::default()
            },
            Region {
                span_count: 3,
                paint: OK_PAINT_START,
                flags: RegionFlags::TILE_BOUNDARY,
                ..Default::default()
            },
            Region {
                span_count: 3,
                paint: OK_PAINT_START + 1,
                ..Default::default()
            },
            Region {
                span_count: 30,
                paint: OK_PAINT_START,
                ..Default::default()
            },
        ];
        filter_bad_regions(&mut regions, 5);
        assert_eq!(regions[0], Region::default());
        assert_eq!(regions[1].span_count, 3);
        assert_eq!(regions[2].span_count, 3);
        assert_eq!(regions[3].span_count, 30);
    }
}
