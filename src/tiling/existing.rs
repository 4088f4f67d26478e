//! Detection of tiles completed by an earlier run

use std::path::Path;

use log::debug;

use crate::raster::GeoTransform;
use crate::tiff::{probe_file, TiffSummary};

/// What a finished tile must look like to be reused
#[derive(Debug, Clone, PartialEq)]
pub struct TileExpectation {
    pub band_count: u64,
    /// Exact size, `None` when only the band layout is known
    pub size: Option<(u64, u64)>,
    /// Minimum number of internal overviews
    pub overview_count: usize,
    /// Whether an internal mask must be present
    pub masked: bool,
    /// Georeferencing, compared when the file carries one
    pub geotransform: Option<GeoTransform>,
}

impl TileExpectation {
    pub fn new(band_count: u64) -> Self {
        TileExpectation {
            band_count,
            size: None,
            overview_count: 0,
            masked: false,
            geotransform: None,
        }
    }

    pub fn with_size(mut self, width: u64, height: u64) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn with_overviews(mut self, count: usize) -> Self {
        self.overview_count = count;
        self
    }

    pub fn with_mask(mut self) -> Self {
        self.masked = true;
        self
    }

    pub fn with_geotransform(mut self, geotransform: GeoTransform) -> Self {
        self.geotransform = Some(geotransform);
        self
    }

    /// Whether a probed file satisfies the expectation
    pub fn matches(&self, summary: &TiffSummary) -> bool {
        if summary.samples_per_pixel != self.band_count {
            return false;
        }
        if let Some((width, height)) = self.size {
            if summary.width != width || summary.height != height {
                return false;
            }
        }
        if summary.overview_count < self.overview_count {
            return false;
        }
        if self.masked && summary.mask_count == 0 {
            return false;
        }
        match (&self.geotransform, &summary.geotransform) {
            (Some(expected), Some(actual)) => same_geotransform(expected, actual),
            _ => true,
        }
    }
}

/// Whether `path` exists and probes as a finished tile
pub fn is_complete(path: &Path, expectation: &TileExpectation) -> bool {
    if !path.is_file() {
        return false;
    }
    match probe_file(path) {
        Ok(summary) => {
            let complete = expectation.matches(&summary);
            if !complete {
                debug!("{} exists but is incomplete: {:?}", path.display(), summary);
            }
            complete
        }
        Err(e) => {
            debug!("{} exists but cannot be probed: {}", path.display(), e);
            false
        }
    }
}

/// Coefficients agree to a hundredth of a pixel
fn same_geotransform(expected: &GeoTransform, actual: &GeoTransform) -> bool {
    let pixel = expected.pixel_width().abs().max(expected.pixel_height().abs());
    let tolerance = if pixel > 0.0 { pixel / 100.0 } else { 1e-9 };
    expected
        .coefficients
        .iter()
        .zip(actual.coefficients.iter())
        .all(|(a, b)| (a - b).abs() <= tolerance)
}
