//! Row-major tile grid composition.

use crate::error::{Result, VizError};
use crate::pixels::PixelBuffer;

/// A labeled visualization tile.
#[derive(Debug, Clone)]
pub struct VisualizationTile {
    /// The rendered tile.
    pub image: PixelBuffer,
    /// Display label.
    pub label: String,
}

impl VisualizationTile {
    /// Create a new tile.
    pub fn new(image: PixelBuffer, label: impl Into<String>) -> Self {
        Self {
            image,
            label: label.into(),
        }
    }
}

/// Compose tiles into a row-major grid.
///
/// Tiles are placed in input order, `grid_width` per row; the final row is
/// padded with blank tiles so the grid is always rectangular. The layout is
/// pure composition, deterministic, and ordering-preserving.
///
/// # Arguments
///
/// * `tiles` - Tiles in filter order, all of the same dimensions
/// * `grid_width` - Tiles per row (at least 1 is enforced)
/// * `tile_width`, `tile_height` - Expected dimensions of every tile
///
/// # Errors
///
/// [`VizError::TileSizeMismatch`] when any tile deviates from the expected
/// dimensions.
pub fn assemble_grid(
    tiles: &[PixelBuffer],
    grid_width: usize,
    tile_width: usize,
    tile_height: usize,
) -> Result<PixelBuffer> {
    let grid_width = grid_width.max(1);
    let rows = tiles.len().div_ceil(grid_width);
    let rows = rows.max(1);

    for tile in tiles {
        if tile.width() != tile_width || tile.height() != tile_height {
            return Err(VizError::TileSizeMismatch {
                expected_width: tile_width,
                expected_height: tile_height,
                got_width: tile.width(),
                got_height: tile.height(),
            });
        }
    }

    let mut grid = PixelBuffer::blank(grid_width * tile_width, rows * tile_height);
    for (i, tile) in tiles.iter().enumerate() {
        let col = i % grid_width;
        let row = i / grid_width;
        grid.blit(tile, col * tile_width, row * tile_height);
    }

    // Cells past the last tile stay blank.
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorMap;

    fn solid_tile(value: f32, size: usize) -> PixelBuffer {
        PixelBuffer::from_map(&vec![value; size * size], size, size, ColorMap::Gray).unwrap()
    }

    #[test]
    fn test_grid_rows_and_padding() {
        // 10 tiles in rows of 4: ceil(10/4) = 3 rows, last row has 2 blanks.
        let tiles: Vec<PixelBuffer> = (0..10).map(|_| solid_tile(1.0, 8)).collect();
        let grid = assemble_grid(&tiles, 4, 8, 8).unwrap();

        assert_eq!(grid.width(), 4 * 8);
        assert_eq!(grid.height(), 3 * 8);

        // Tile 9 (row 2, col 1) is present...
        let last_row = 2 * 8 + 4;
        assert_eq!(grid.pixel(8 + 4, last_row), [255, 255, 255, 255]);
        // ...while the last two cells of the final row are blank.
        assert_eq!(grid.pixel(2 * 8 + 4, last_row), [0, 0, 0, 255]);
        assert_eq!(grid.pixel(3 * 8 + 4, last_row), [0, 0, 0, 255]);
    }

    #[test]
    fn test_grid_preserves_order() {
        let tiles = vec![solid_tile(0.0, 4), solid_tile(1.0, 4)];
        let grid = assemble_grid(&tiles, 2, 4, 4).unwrap();

        assert_eq!(grid.pixel(1, 1), [0, 0, 0, 255]);
        assert_eq!(grid.pixel(5, 1), [255, 255, 255, 255]);
    }

    #[test]
    fn test_grid_tile_size_mismatch() {
        let tiles = vec![solid_tile(1.0, 4), solid_tile(1.0, 8)];
        let result = assemble_grid(&tiles, 2, 4, 4);
        assert!(matches!(result, Err(VizError::TileSizeMismatch { .. })));
    }

    #[test]
    fn test_empty_grid_is_single_blank_cell() {
        let grid = assemble_grid(&[], 4, 8, 8).unwrap();
        assert_eq!(grid.width(), 4 * 8);
        assert_eq!(grid.height(), 8);
        assert_eq!(grid.pixel(0, 0), [0, 0, 0, 255]);
    }
}
