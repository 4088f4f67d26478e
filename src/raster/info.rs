//! Raster metadata as seen by the tiler

use super::geotransform::{Extent, GeoTransform};

/// Metadata of a raster on disk
///
/// Produced by the operator backend. The tiler only reads it: to size the
/// tile grid, to describe a tile's pixel grid when rasterizing its mask,
/// and to check aggregated tiles against the extent of their inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    /// Width in pixels
    pub width: u64,
    /// Height in pixels
    pub height: u64,
    /// Number of bands
    pub band_count: usize,
    /// Pixel to map transform
    pub geotransform: GeoTransform,
    /// Spatial reference as WKT, when the raster has one
    pub projection: Option<String>,
}

impl RasterInfo {
    /// Create raster metadata without a spatial reference
    pub fn new(width: u64, height: u64, band_count: usize, geotransform: GeoTransform) -> Self {
        RasterInfo {
            width,
            height,
            band_count,
            geotransform,
            projection: None,
        }
    }

    /// Attach a spatial reference
    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Map extent covered by the raster
    pub fn extent(&self) -> Extent {
        self.geotransform.extent(self.width, self.height)
    }

    /// Metadata of a `width` x `height` window whose top-left pixel is `(x, y)`
    ///
    /// The window may extend past the raster edge; the result describes the
    /// window's full pixel grid, as a crop operator writes it.
    pub fn window(&self, x: u64, y: u64, width: u64, height: u64) -> RasterInfo {
        RasterInfo {
            width,
            height,
            band_count: self.band_count,
            geotransform: self.geotransform.shifted(x as f64, y as f64),
            projection: self.projection.clone(),
        }
    }

    /// Metadata after resampling to `percent` of the linear size
    pub fn rescaled(&self, percent: f64) -> RasterInfo {
        let factor = percent / 100.0;
        let width = scaled_size(self.width, factor);
        let height = scaled_size(self.height, factor);
        RasterInfo {
            width,
            height,
            band_count: self.band_count,
            geotransform: self.geotransform.resampled(
                self.width as f64 / width as f64,
                self.height as f64 / height as f64,
            ),
            projection: self.projection.clone(),
        }
    }
}

/// Output size of a percentage resample, never below one pixel
pub fn scaled_size(size: u64, factor: f64) -> u64 {
    ((size as f64 * factor).round() as u64).max(1)
}
