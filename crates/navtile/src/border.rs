/// The band of columns around a tile that only exists so the tile's own walkable area
/// sees its surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BorderBand {
    /// Width of the band in columns.
    pub(crate) size: i32,
    /// Grid width including the band.
    pub(crate) width: i32,
    /// Grid height including the band.
    pub(crate) height: i32,
}

impl BorderBand {
    pub(crate) fn new(size: usize, width: u16, height: u16) -> Self {
        Self {
            size: size as i32,
            width: width as i32,
            height: height as i32,
        }
    }

    /// The cell lies inside the band.
    #[inline]
    pub(crate) fn is_border_cell(&self, x: i32, y: i32) -> bool {
        x < self.size
            || x >= self.width - self.size
            || y < self.size
            || y >= self.height - self.size
    }

    /// The cell is part of the outermost ring of the tile proper.
    #[inline]
    pub(crate) fn is_boundary_cell(&self, x: i32, y: i32) -> bool {
        x == self.size
            || x == self.width - self.size - 1
            || y == self.size
            || y == self.height - self.size - 1
    }

    /// The cell corner lies on the edge of the tile proper.
    #[inline]
    pub(crate) fn is_boundary_vertex(&self, x: i32, y: i32) -> bool {
        x == self.size
            || x == self.width - self.size
            || y == self.size
            || y == self.height - self.size
    }

    /// The cell corner is one of the four corners of the tile proper.
    #[inline]
    pub(crate) fn is_corner_vertex(&self, x: i32, y: i32) -> bool {
        (x == self.size || x == self.width - self.size)
            && (y == self.size || y == self.height - self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_cells_and_vertices() {
        let band = BorderBand::new(2, 10, 8);
        assert!(band.is_border_cell(1, 4));
        assert!(band.is_border_cell(8, 4));
        assert!(!band.is_border_cell(2, 2));
        assert!(band.is_boundary_cell(2, 4));
        assert!(band.is_boundary_cell(7, 4));
        assert!(band.is_boundary_cell(4, 5));
        assert!(!band.is_boundary_cell(4, 4));
        assert!(band.is_boundary_vertex(8, 3));
        assert!(!band.is_boundary_vertex(7, 3));
        assert!(band.is_corner_vertex(2, 6));
        assert!(band.is_corner_vertex(8, 2));
        assert!(!band.is_corner_vertex(8, 3));
    }
}
