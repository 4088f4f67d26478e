pub mod errors;
pub mod config;
pub mod io;
pub mod tiff;
pub mod raster;
pub mod operators;
pub mod tiling;
pub mod commands;
pub mod utils;

pub use crate::config::{FailurePolicy, GdalSettings, TilerConfig, TilerConfigBuilder};
pub use crate::errors::{TilerError, TilerResult};
pub use crate::operators::{Footprint, GdalOperators, RasterOperators};
pub use crate::raster::{Band, Extent, GeoTransform, PixelWindow, RasterInfo};
pub use crate::tiling::{BuildReport, PyramidBuilder, TileCoordinate, TileNamer, TileRect, Variant};
