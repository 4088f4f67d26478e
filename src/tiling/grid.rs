//! Tile grids and index rectangles

use std::fmt;

use crate::errors::{TilerError, TilerResult};
use crate::raster::PixelWindow;

/// Tiles per axis of an aggregation block
pub const BLOCK_SPAN: u32 = 4;

/// Level-0 tile grid over a source raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub columns: u32,
    pub rows: u32,
    pub tile_size: u32,
}

impl TileGrid {
    /// Grid covering a `width` x `height` raster; partial edge tiles count
    pub fn for_raster(width: u64, height: u64, tile_size: u32) -> TilerResult<Self> {
        if tile_size == 0 {
            return Err(TilerError::InvalidConfig("tile size must be positive".to_string()));
        }
        let size = u64::from(tile_size);
        let columns = width.div_ceil(size);
        let rows = height.div_ceil(size);
        let columns = u32::try_from(columns)
            .map_err(|_| TilerError::GenericError(format!("Too many tile columns: {}", columns)))?;
        let rows =
            u32::try_from(rows).map_err(|_| TilerError::GenericError(format!("Too many tile rows: {}", rows)))?;

        Ok(TileGrid { columns, rows, tile_size })
    }

    /// Rectangle covering the whole grid
    pub fn full_rect(&self) -> TileRect {
        TileRect::new(0, 0, self.columns, self.rows)
    }

    /// Source window of the 0-based cell `(column, row)`
    ///
    /// Always `tile_size` square; edge windows extend past the raster.
    pub fn pixel_window(&self, column: u32, row: u32) -> PixelWindow {
        let size = u64::from(self.tile_size);
        PixelWindow::new(u64::from(column) * size, u64::from(row) * size, size, size)
    }
}

/// A rectangle of 0-based tile cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
    pub start_column: u32,
    pub start_row: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub fn new(start_column: u32, start_row: u32, width: u32, height: u32) -> Self {
        TileRect { start_column, start_row, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn tile_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    fn end_column(&self) -> u64 {
        u64::from(self.start_column) + u64::from(self.width)
    }

    fn end_row(&self) -> u64 {
        u64::from(self.start_row) + u64::from(self.height)
    }

    pub fn contains(&self, column: u32, row: u32) -> bool {
        column >= self.start_column
            && row >= self.start_row
            && u64::from(column) < self.end_column()
            && u64::from(row) < self.end_row()
    }

    /// Overlap with `other`, empty when the rectangles are disjoint
    pub fn intersect(&self, other: &TileRect) -> TileRect {
        let start_column = self.start_column.max(other.start_column);
        let start_row = self.start_row.max(other.start_row);
        let end_column = self.end_column().min(other.end_column());
        let end_row = self.end_row().min(other.end_row());

        let width = end_column.saturating_sub(u64::from(start_column)) as u32;
        let height = end_row.saturating_sub(u64::from(start_row)) as u32;
        if width == 0 || height == 0 {
            return TileRect::new(start_column, start_row, 0, 0);
        }
        TileRect::new(start_column, start_row, width, height)
    }

    /// Rectangle of the next pyramid level: every bound floor-divided by the block span
    pub fn coarser(&self) -> TileRect {
        TileRect::new(
            self.start_column / BLOCK_SPAN,
            self.start_row / BLOCK_SPAN,
            self.width / BLOCK_SPAN,
            self.height / BLOCK_SPAN,
        )
    }

    /// Whether the rectangle starts on a block boundary
    pub fn is_block_aligned(&self) -> bool {
        self.start_column % BLOCK_SPAN == 0 && self.start_row % BLOCK_SPAN == 0
    }

    /// Every cell, row by row
    pub fn cells(&self) -> Vec<(u32, u32)> {
        let mut cells = Vec::with_capacity(self.tile_count() as usize);
        for row in self.start_row..self.start_row + self.height {
            for column in self.start_column..self.start_column + self.width {
                cells.push((column, row));
            }
        }
        cells
    }
}

impl fmt::Display for TileRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "columns {}..{}, rows {}..{} ({}x{})",
            self.start_column,
            self.end_column(),
            self.start_row,
            self.end_row(),
            self.width,
            self.height
        )
    }
}
