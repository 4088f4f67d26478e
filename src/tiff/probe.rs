//! Tile completeness probe
//!
//! Summarizes a GeoTIFF from its IFD chain alone: dimensions, band count,
//! number of internal overviews and masks, and the geotransform.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::errors::{TilerError, TilerResult};
use crate::io::seekable::SeekableReader;
use crate::raster::GeoTransform;
use crate::tiff::constants::tags;
use crate::tiff::ifd::IFD;
use crate::tiff::reader::TiffReader;

/// Structural summary of a GeoTIFF
#[derive(Debug, Clone, PartialEq)]
pub struct TiffSummary {
    /// Width of the full-resolution image
    pub width: u64,
    /// Height of the full-resolution image
    pub height: u64,
    /// Bands of the full-resolution image
    pub samples_per_pixel: u64,
    /// Internal reduced-resolution images
    pub overview_count: usize,
    /// Internal transparency masks (including mask overviews)
    pub mask_count: usize,
    /// Georeferencing, when the file carries GeoTIFF model tags
    pub geotransform: Option<GeoTransform>,
    /// Whether the file is a BigTIFF
    pub is_big_tiff: bool,
}

/// Probe a GeoTIFF on disk
pub fn probe_file(path: &Path) -> TilerResult<TiffSummary> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let summary = probe(&mut reader)?;
    debug!(
        "Probed {}: {}x{}x{}, {} overviews, {} masks",
        path.display(), summary.width, summary.height, summary.samples_per_pixel,
        summary.overview_count, summary.mask_count
    );
    Ok(summary)
}

/// Probe a GeoTIFF from any seekable reader
pub fn probe(reader: &mut dyn SeekableReader) -> TilerResult<TiffSummary> {
    let mut tiff_reader = TiffReader::new();
    let tiff = tiff_reader.read(reader)?;

    let main = tiff.main_ifd().ok_or(TilerError::InvalidHeader)?;
    let (width, height) = main
        .get_dimensions()
        .ok_or(TilerError::TagNotFound(tags::IMAGE_WIDTH))?;

    let geotransform = read_geotransform(&tiff_reader, reader, main)?;

    Ok(TiffSummary {
        width,
        height,
        samples_per_pixel: main.get_samples_per_pixel(),
        overview_count: tiff.overviews().len(),
        mask_count: tiff.masks().len(),
        geotransform,
        is_big_tiff: tiff.is_big_tiff,
    })
}

/// Read the geotransform from the model transformation, or scale and tiepoint
///
/// Follows the PixelIsArea convention: the tiepoint maps the top-left
/// corner of raster pixel (i, j) to map coordinates (x, y).
fn read_geotransform(
    tiff_reader: &TiffReader,
    reader: &mut dyn SeekableReader,
    ifd: &IFD,
) -> TilerResult<Option<GeoTransform>> {
    if let Some(entry) = ifd.get_entry(tags::MODEL_TRANSFORMATION_TAG) {
        let m = tiff_reader.read_doubles(reader, entry)?;
        if m.len() >= 8 {
            return Ok(Some(GeoTransform::new([m[3], m[0], m[1], m[7], m[4], m[5]])));
        }
    }

    let (scale_entry, tiepoint_entry) = match (
        ifd.get_entry(tags::MODEL_PIXEL_SCALE_TAG),
        ifd.get_entry(tags::MODEL_TIEPOINT_TAG),
    ) {
        (Some(scale), Some(tiepoint)) => (scale, tiepoint),
        _ => return Ok(None),
    };

    let scale = tiff_reader.read_doubles(reader, scale_entry)?;
    let tiepoint = tiff_reader.read_doubles(reader, tiepoint_entry)?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return Ok(None);
    }

    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(Some(GeoTransform::new([origin_x, scale[0], 0.0, origin_y, 0.0, -scale[1]])))
}
