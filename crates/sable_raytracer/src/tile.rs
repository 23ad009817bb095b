//! Tile grid used to hand out work to render workers.
//!
//! Tiles are issued in row-major order by a linear index; a worker turns the
//! index it claimed into a pixel rectangle with `TileGrid::tile`.

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 16;

/// A rectangular region of the image, clamped to the image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X coordinate of the tile's top-left corner
    pub x: u32,
    /// Y coordinate of the tile's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Linear issuance index
    pub index: usize,
}

impl Tile {
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Pixel coordinates of the tile in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y..self.y + self.height).flat_map(move |j| (self.x..self.x + self.width).map(move |i| (i, j)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles_x: u32,
    tiles_y: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            width,
            height,
            tile_size,
            tiles_x: width.div_ceil(tile_size),
            tiles_y: height.div_ceil(tile_size),
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> u32 {
        self.tiles_y
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    /// Tile for a linear index, or `None` once its row lies below the image.
    pub fn tile(&self, index: usize) -> Option<Tile> {
        if self.tiles_x == 0 {
            return None;
        }
        let tile_x = (index % self.tiles_x as usize) as u32;
        let tile_y = index / self.tiles_x as usize;
        if tile_y >= self.tiles_y as usize {
            return None;
        }
        let tile_y = tile_y as u32;

        let x = tile_x * self.tile_size;
        let y = tile_y * self.tile_size;
        Some(Tile {
            x,
            y,
            width: self.tile_size.min(self.width - x),
            height: self.tile_size.min(self.height - y),
            index,
        })
    }

    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.tile_count()).filter_map(|i| self.tile(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_grid_exact_fit() {
        let grid = TileGrid::new(64, 32, 16);
        assert_eq!(grid.tiles_x(), 4);
        assert_eq!(grid.tiles_y(), 2);
        assert_eq!(grid.tile_count(), 8);
        assert!(grid.tiles().all(|t| t.pixel_count() == 256));
    }

    #[test]
    fn test_edge_tiles_are_clamped() {
        let grid = TileGrid::new(100, 50, 16);
        assert_eq!(grid.tiles_x(), 7);
        assert_eq!(grid.tiles_y(), 4);

        let last = grid.tile(grid.tile_count() - 1).unwrap();
        assert_eq!((last.x, last.y), (96, 48));
        assert_eq!((last.width, last.height), (4, 2));
        assert!(grid.tile(grid.tile_count()).is_none());
    }

    #[test]
    fn test_tiles_cover_every_pixel_once() {
        for (w, h) in [(1, 1), (16, 16), (17, 33), (100, 7), (45, 64)] {
            let grid = TileGrid::new(w, h, 16);
            let mut seen = vec![0u8; (w * h) as usize];
            for tile in grid.tiles() {
                for (i, j) in tile.pixels() {
                    seen[(i + j * w) as usize] += 1;
                }
            }
            assert!(seen.iter().all(|&c| c == 1), "{w}x{h}");
        }
    }

    #[test]
    fn test_row_major_issuance() {
        let grid = TileGrid::new(48, 48, 16);
        let origins: Vec<_> = grid.tiles().map(|t| (t.x, t.y)).collect();
        assert_eq!(origins[0], (0, 0));
        assert_eq!(origins[1], (16, 0));
        assert_eq!(origins[3], (0, 16));
    }
}
