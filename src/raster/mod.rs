//! Raster metadata and descriptors
//!
//! The tiler never touches pixel data. It reads raster metadata (size,
//! geotransform, projection, band count) through the operator backend and
//! writes the small VRT descriptor that attaches a validity mask to a tile.

mod bands;
mod geotransform;
mod info;
pub mod vrt;
mod window;

pub use self::bands::{Band, COMPOSITE_BAND_COUNT};
pub use self::geotransform::{Extent, GeoTransform};
pub use self::info::{scaled_size, RasterInfo};
pub use self::vrt::MaskedTileDescriptor;
pub use self::window::PixelWindow;
