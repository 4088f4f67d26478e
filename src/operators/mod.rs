//! Raster operators
//!
//! Every pixel-touching step of the tiler goes through [`RasterOperators`].
//! The production backend shells out to the GDAL command-line tools
//! ([`GdalOperators`]); tests plug in an in-memory backend.

pub mod command;
mod gdal;
mod gdalinfo;

use std::path::{Path, PathBuf};

use crate::errors::TilerResult;
use crate::raster::{Band, PixelWindow, RasterInfo};

pub use self::command::ToolCommand;
pub use self::gdal::GdalOperators;
pub use self::gdalinfo::parse_gdalinfo_json;

/// Vector footprint of the valid pixels of a raster
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    /// Vector file holding the footprint polygon
    pub vector_file: PathBuf,
    /// Layer of the polygon within `vector_file`
    pub layer: String,
    /// Every file the extraction produced, `vector_file` included
    pub artifacts: Vec<PathBuf>,
}

/// The capability interface the tiler needs from a raster library
///
/// Implementations must be usable from several worker threads at once.
/// Each call either produces its output file(s) or returns an error; a
/// failed call may leave partial output behind.
pub trait RasterOperators: Send + Sync {
    /// Read size, geotransform, projection and band count of a raster
    fn raster_info(&self, raster: &Path) -> TilerResult<RasterInfo>;

    /// Copy a pixel window of `source` into a tiled 4-band GeoTIFF
    ///
    /// Window pixels outside the source are written as zero.
    fn crop(&self, source: &Path, window: &PixelWindow, output: &Path) -> TilerResult<()>;

    /// Extract the polygon enclosing the valid pixels of `raster`
    fn extract_footprint(&self, raster: &Path) -> TilerResult<Footprint>;

    /// Burn `footprint` into a 1-bit mask on exactly the pixel grid of `grid`
    fn rasterize(&self, footprint: &Footprint, grid: &RasterInfo, output: &Path) -> TilerResult<()>;

    /// Materialize a 5-band descriptor, storing band 5 as the internal mask
    fn apply_mask(&self, descriptor: &Path, output: &Path) -> TilerResult<()>;

    /// Write the bands of `band` from a 4-band composite into their own tile
    fn extract_bands(&self, source: &Path, band: Band, output: &Path) -> TilerResult<()>;

    /// Add internal overviews with the given reduction factors, in place
    fn build_overviews(&self, raster: &Path, factors: &[u32], band: Band) -> TilerResult<()>;

    /// Write a virtual mosaic of `tiles`, each placed by its own geotransform
    fn build_mosaic(&self, tiles: &[PathBuf], output: &Path) -> TilerResult<()>;

    /// Resample `source` to `percent` of its linear size
    fn rescale(&self, source: &Path, percent: f64, band: Band, output: &Path) -> TilerResult<()>;
}
