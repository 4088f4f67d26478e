//! Pixel windows into a source raster

use std::fmt;

/// A rectangular window of source pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub x: u64,
    pub y: u64,
    pub width: u64,
    pub height: u64,
}

impl PixelWindow {
    pub fn new(x: u64, y: u64, width: u64, height: u64) -> Self {
        PixelWindow { x, y, width, height }
    }

    /// The part of the window that lies inside a `raster_width` x `raster_height` raster
    ///
    /// Returns `None` when the window lies entirely outside the raster.
    pub fn clipped(&self, raster_width: u64, raster_height: u64) -> Option<PixelWindow> {
        if self.x >= raster_width || self.y >= raster_height {
            return None;
        }
        let width = self.width.min(raster_width - self.x);
        let height = self.height.min(raster_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(PixelWindow::new(self.x, self.y, width, height))
    }

    /// Whether the two windows share at least one pixel
    pub fn overlaps(&self, other: &PixelWindow) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Number of pixels in the window
    pub fn area(&self) -> u64 {
        self.width * self.height
    }
}

impl fmt::Display for PixelWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
