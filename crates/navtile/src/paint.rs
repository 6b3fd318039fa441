//! Paint separates the walkable surface into areas that must not share triangles,
//! either because they are too close to an edge or because markups annotate them differently.

use glam::{IVec2, Vec3};

use crate::{
    area::AreaAnnotation, bounding_volume::BoundingVolume, compact_span_grid::CompactSpanGrid,
    config::MarkupVolume, label::is_border_label, math::Aabb3d,
};

/// Not painted yet. Only found in the border band after painting.
pub(crate) const NO_PAINT: u16 = 0;
/// Too close to an edge to walk on.
pub(crate) const BAD_PAINT: u16 = 1;
/// Walkable. Values from here on index the paint palette.
pub(crate) const OK_PAINT_START: u16 = 2;

/// What a walkable paint value stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintData {
    /// The annotation of the triangles generated from this paint.
    pub area: AreaAnnotation,
    /// The markup owning this paint, as index into the tile's markups.
    /// Set only for markups that store their triangles.
    pub markup: Option<usize>,
}

/// A markup overlapping the tile, together with the palette slot it paints with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MarkupData {
    /// Index into the tile's markups.
    pub(crate) markup_index: usize,
    /// Index into the paint palette.
    pub(crate) paint_index: u16,
}

impl MarkupData {
    #[inline]
    pub(crate) fn paint(&self) -> u16 {
        OK_PAINT_START + self.paint_index
    }
}

/// Assigns a palette slot to every markup. Slot 0 is the default area.
///
/// Markups storing their triangles get a slot of their own, all others share one per annotation.
/// Markups are painted in the order this leaves them in, sorted by area type.
pub(crate) fn create_paint_palette(
    markups: &mut [MarkupData],
    volumes: &[MarkupVolume],
    default_area: AreaAnnotation,
    palette: &mut Vec<PaintData>,
) {
    markups.sort_by_key(|markup| volumes[markup.markup_index].area.area_type());

    palette.clear();
    palette.push(PaintData {
        area: default_area,
        markup: None,
    });
    for markup in markups.iter_mut() {
        let volume = &volumes[markup.markup_index];
        let shared = (!volume.store_triangles)
            .then(|| {
                palette
                    .iter()
                    .position(|paint| paint.markup.is_none() && paint.area == volume.area)
            })
            .flatten();
        markup.paint_index = match shared {
            Some(index) => index as u16,
            None => {
                palette.push(PaintData {
                    area: volume.area,
                    markup: volume.store_triangles.then_some(markup.markup_index),
                });
                (palette.len() - 1) as u16
            }
        };
    }
}

/// Where the grid lies and which part of it may be painted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PaintArea {
    /// The box covered by the grid, border band included.
    pub(crate) aabb: Aabb3d,
    pub(crate) voxel_size: Vec3,
    /// Width of the border band in columns.
    pub(crate) border: usize,
    /// Agent radius in voxels.
    pub(crate) agent_radius: u16,
}

impl PaintArea {
    /// The markup's vertical extent in voxels above the grid base.
    fn z_range(&self, volume_aabb: &Aabb3d) -> (i32, i32) {
        let min = (volume_aabb.min.z - self.aabb.min.z) / self.voxel_size.z;
        let max = (volume_aabb.max.z - self.aabb.min.z) / self.voxel_size.z;
        (min as i32, max as i32)
    }

    fn local_vertices(&self, volume: &BoundingVolume) -> Vec<Vec3> {
        volume.vertices().iter().map(|v| *v - self.aabb.min).collect()
    }
}

/// Collects the sorted column indices where the polygon edges cross the horizontal line `y_line`.
fn scanline_crossings(vertices: &[Vec3], y_line: f32, voxel_size_x: f32, crossings: &mut Vec<i32>) {
    crossings.clear();
    let Some(mut p0) = vertices.last().copied() else {
        return;
    };
    for p1 in vertices.iter().copied() {
        if (p1.y < y_line && p0.y >= y_line) || (p0.y < y_line && p1.y >= y_line) {
            let x = p0.x + (p1.x - p0.x) * (y_line - p0.y) / (p1.y - p0.y);
            crossings.push((x / voxel_size_x) as i32);
        }
        p0 = p1;
    }
    crossings.sort_unstable();
}

/// Fills the spans `[start, end]` of the pairs of `crossings`, clamped to `[min, max)`.
fn for_each_filled_run(crossings: &[i32], min: i32, max: i32, mut fill: impl FnMut(i32, i32)) {
    for pair in crossings.chunks_exact(2) {
        let (start, end) = (pair[0], pair[1]);
        if start >= max {
            break;
        }
        if end < min {
            continue;
        }
        fill(start.max(min), end.min(max - 1));
    }
}

impl CompactSpanGrid {
    fn paint_column(&self, x: usize, y: usize, z_range: (i32, i32), paint: u16, paints: &mut [u16]) {
        for index in self.cell_at(x, y).index_range() {
            let top = self.spans[index].top() as i32;
            if top >= z_range.0 && top <= z_range.1 {
                paints[index] = paint;
            }
        }
    }

    /// Scan converts the markup footprint and paints every span within the markup's height range.
    pub(crate) fn paint_markup_direct(
        &self,
        area: &PaintArea,
        volume: &BoundingVolume,
        paint: u16,
        paints: &mut [u16],
    ) {
        let vertices = area.local_vertices(volume);
        let volume_aabb = volume.aabb().translated(-area.aabb.min);
        let border = area.border as i32;
        let paint_end = IVec2::new(self.width as i32, self.height as i32) - border;

        let y_start = border.max((volume_aabb.min.y / area.voxel_size.y) as i32);
        let y_end = paint_end.y.min((volume_aabb.max.y / area.voxel_size.y) as i32);
        let z_range = area.z_range(volume.aabb());

        let mut crossings = Vec::with_capacity(vertices.len());
        for y in y_start..y_end {
            scanline_crossings(
                &vertices,
                y as f32 * area.voxel_size.y,
                area.voxel_size.x,
                &mut crossings,
            );
            for_each_filled_run(&crossings, border, paint_end.x, |start, end| {
                for x in start..=end {
                    self.paint_column(x as usize, y as usize, z_range, paint, paints);
                }
            });
        }
    }

    /// Paints the markup footprint grown by the agent radius.
    ///
    /// The footprint is rasterized onto a scratch canvas first, which is then grown with a distance transform.
    pub(crate) fn paint_markup_expanded(
        &self,
        area: &PaintArea,
        volume: &BoundingVolume,
        paint: u16,
        paints: &mut [u16],
    ) {
        let expand = Vec3::new(
            area.agent_radius as f32 * area.voxel_size.x,
            area.agent_radius as f32 * area.voxel_size.y,
            0.0,
        );
        let volume_aabb = volume.aabb().expanded(expand).translated(-area.aabb.min);
        let raster_min = IVec2::new(
            ((volume_aabb.min.x / area.voxel_size.x) as i32).max(0),
            ((volume_aabb.min.y / area.voxel_size.y) as i32).max(0),
        );
        let raster_max = IVec2::new(
            ((volume_aabb.max.x / area.voxel_size.x) as i32).min(self.width as i32),
            ((volume_aabb.max.y / area.voxel_size.y) as i32).min(self.height as i32),
        );
        if raster_min.x >= raster_max.x || raster_min.y >= raster_max.y {
            return;
        }

        let mut canvas = MarkupCanvas::new(raster_min, raster_max);
        canvas.rasterize(&area.local_vertices(volume), area.voxel_size);
        canvas.grow((area.agent_radius + 1) * 2);

        let z_range = area.z_range(volume.aabb());
        let border = area.border as i32;
        let paint_end = IVec2::new(self.width as i32, self.height as i32) - border;
        for y in 0..canvas.size.y {
            for x in 0..canvas.size.x {
                if !canvas.painted[canvas.index(x, y)] {
                    continue;
                }
                let column = IVec2::new(x, y) + canvas.min;
                if column.x < border
                    || column.x >= paint_end.x
                    || column.y < border
                    || column.y >= paint_end.y
                {
                    continue;
                }
                self.paint_column(column.x as usize, column.y as usize, z_range, paint, paints);
            }
        }
    }

    /// Assigns a paint to every span.
    ///
    /// Markups are painted first. Afterwards every span of the tile proper that is too close to an edge
    /// or tagged as border becomes [`BAD_PAINT`], every unpainted one gets the default area.
    pub(crate) fn calc_paint_values(
        &self,
        area: &PaintArea,
        markups: &[MarkupData],
        volumes: &[MarkupVolume],
        distances: &[u16],
        labels: &[u16],
        erosion: u16,
        paints: &mut Vec<u16>,
    ) {
        paints.clear();
        paints.resize(self.spans.len(), NO_PAINT);

        for markup in markups {
            let volume = &volumes[markup.markup_index];
            if volume.expand_by_agent_radius {
                self.paint_markup_expanded(area, &volume.volume, markup.paint(), paints);
            } else {
                self.paint_markup_direct(area, &volume.volume, markup.paint(), paints);
            }
        }

        let border = area.border;
        for y in border..self.height as usize - border {
            for x in border..self.width as usize - border {
                for index in self.cell_at(x, y).index_range() {
                    if distances[index] < erosion || is_border_label(labels[index]) {
                        paints[index] = BAD_PAINT;
                    } else if paints[index] == NO_PAINT {
                        paints[index] = OK_PAINT_START;
                    }
                }
            }
        }
    }
}

/// Scratch raster used to grow a markup footprint.
struct MarkupCanvas {
    min: IVec2,
    size: IVec2,
    painted: Vec<bool>,
    distances: Vec<u16>,
}

impl MarkupCanvas {
    /// Leaves room for one diagonal step without overflowing.
    const FAR: u16 = u16::MAX - 3;

    fn new(min: IVec2, max: IVec2) -> Self {
        let size = max - min;
        let len = (size.x * size.y) as usize;
        Self {
            min,
            size,
            painted: vec![false; len],
            distances: vec![Self::FAR; len],
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (x + y * self.size.x) as usize
    }

    fn rasterize(&mut self, vertices: &[Vec3], voxel_size: Vec3) {
        let mut crossings = Vec::with_capacity(vertices.len());
        for y in self.min.y..self.min.y + self.size.y {
            scanline_crossings(vertices, y as f32 * voxel_size.y, voxel_size.x, &mut crossings);
            for crossing in &mut crossings {
                *crossing -= self.min.x;
            }
            let canvas_y = y - self.min.y;
            for_each_filled_run(&crossings, 0, self.size.x, |start, end| {
                for x in start..=end {
                    let index = self.index(x, canvas_y);
                    self.painted[index] = true;
                    self.distances[index] = 0;
                }
            });
        }
    }

    /// Paints every cell closer than `threshold` to the rasterized footprint, in half voxels.
    fn grow(&mut self, threshold: u16) {
        const FORWARD: [(i32, i32, u16); 4] = [(-1, 0, 2), (-1, -1, 3), (0, -1, 2), (1, -1, 3)];
        const BACKWARD: [(i32, i32, u16); 4] = [(1, 0, 2), (1, 1, 3), (0, 1, 2), (-1, 1, 3)];

        fn relax(canvas: &mut MarkupCanvas, x: i32, y: i32, sweep: &[(i32, i32, u16); 4]) {
            let index = canvas.index(x, y);
            let mut best = canvas.distances[index];
            for &(dx, dy, weight) in sweep {
                let (nx, ny) = (x + dx, y + dy);
                if nx >= 0 && nx < canvas.size.x && ny >= 0 && ny < canvas.size.y {
                    best = best.min(canvas.distances[canvas.index(nx, ny)].saturating_add(weight));
                }
            }
            canvas.distances[index] = best;
        }

        for y in 0..self.size.y {
            for x in 0..self.size.x {
                relax(self, x, y, &FORWARD);
            }
        }
        for y in (0..self.size.y).rev() {
            for x in (0..self.size.x).rev() {
                relax(self, x, y, &BACKWARD);
            }
        }

        for (painted, distance) in self.painted.iter_mut().zip(&self.distances) {
            if *distance < threshold {
                *painted = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{compact_span::CompactSpan, label::NO_LABEL};

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

    fn square(min: f32, max: f32) -> BoundingVolume {
        BoundingVolume::new(
            [
                Vec3::new(min, min, 0.0),
                Vec3::new(max, min, 0.0),
                Vec3::new(max, max, 0.0),
                Vec3::new(min, max, 0.0),
            ],
            10.0,
        )
    }

    fn area() -> PaintArea {
        PaintArea {
            aabb: Aabb3d::new(Vec3::ZERO, Vec3::new(10.0, 10.0, 10.0)),
            voxel_size: Vec3::ONE,
            border: 1,
            agent_radius: 1,
        }
    }

    fn markup(area_type: u8, store_triangles: bool) -> MarkupVolume {
        MarkupVolume {
            area: AreaAnnotation::new(area_type, 0),
            store_triangles,
            ..Default::default()
        }
    }

    #[test]
    fn palette_shares_slots_unless_triangles_are_stored() {
        let volumes = [
            markup(3, false),
            markup(1, true),
            markup(3, false),
            markup(0, false),
        ];
        let mut markups: Vec<_> = (0..volumes.len())
            .map(|markup_index| MarkupData {
                markup_index,
                paint_index: 0,
            })
            .collect();
        let mut palette = vec![];
        create_paint_palette(&mut markups, &volumes, AreaAnnotation::new(0, 0), &mut palette);

        let order: Vec<_> = markups.iter().map(|m| m.markup_index).collect();
        assert_eq!(order, [3, 1, 0, 2]);
        let slots: Vec<_> = markups.iter().map(|m| m.paint_index).collect();
        // The default area is reused, the storing markup is unique, both type 3 markups share.
        assert_eq!(slots, [0, 1, 2, 2]);
        assert_eq!(palette.len(), 3);
        assert_eq!(palette[1].markup, Some(1));
        assert_eq!(palette[2].markup, None);
        assert_eq!(palette[2].area, AreaAnnotation::new(3, 0));
    }

    #[test]
    fn direct_markup_paints_its_footprint() {
        let grid = flat_grid(10, 10);
        let mut paints = vec![NO_PAINT; grid.spans.len()];
        grid.paint_markup_direct(&area(), &square(1.5, 5.5), 7, &mut paints);
        let painted = |x: usize, y: usize| paints[grid.cell_at(x, y).index() as usize] == 7;

        for y in 0..10 {
            for x in 0..10 {
                let expected = (1..=5).contains(&x) && (2..=4).contains(&y);
                assert_eq!(painted(x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn direct_markup_respects_height() {
        let grid = flat_grid(10, 10);
        let mut paints = vec![NO_PAINT; grid.spans.len()];
        let high = BoundingVolume::new(
            square(1.5, 5.5)
                .vertices()
                .iter()
                .map(|v| *v + Vec3::Z * 6.0)
                .collect::<Vec<_>>(),
            2.0,
        );
        grid.paint_markup_direct(&area(), &high, 7, &mut paints);
        assert!(paints.iter().all(|paint| *paint == NO_PAINT));
    }

    #[test]
    fn expanded_markup_grows_by_agent_radius() {
        let grid = flat_grid(10, 10);
        let mut paints = vec![NO_PAINT; grid.spans.len()];
        grid.paint_markup_expanded(&area(), &square(1.5, 5.5), 7, &mut paints);
        let painted = |x: usize, y: usize| paints[grid.cell_at(x, y).index() as usize] == 7;

        assert!(painted(3, 3));
        assert!(painted(1, 1));
        assert!(painted(5, 5));
        assert!(painted(3, 1));
        // Outside of the canvas.
        assert!(!painted(6, 3));
        assert!(!painted(3, 6));
        // Inside the border band.
        assert!(!painted(0, 3));
    }

    #[test]
    fn paint_values_mark_edges_bad() {
        let grid = flat_grid(6, 6);
        let mut distances = vec![10; grid.spans.len()];
        let close = grid.cell_at(2, 2).index() as usize;
        distances[close] = 1;
        let mut labels = vec![NO_LABEL; grid.spans.len()];
        grid.paint_border(&mut labels, 1, 0, 0);

        let mut paints = vec![];
        grid.calc_paint_values(&area(), &[], &[], &distances, &labels, 2, &mut paints);
        assert_eq!(paints[close], BAD_PAINT);
        assert_eq!(paints[grid.cell_at(3, 3).index() as usize], OK_PAINT_START);
        assert_eq!(paints[grid.cell_at(0, 3).index() as usize], NO_PAINT);
    }
}
