//! Native GeoTIFF probe
//!
//! A reduced TIFF/BigTIFF reader that only walks the header and IFD chain.
//! It never decodes pixel data: the tiler uses it to confirm that a tile
//! left behind by an earlier run is complete (dimensions, band count,
//! internal overviews, georeferencing) before skipping it.

pub(crate) mod constants;
pub mod ifd;
pub mod reader;
pub mod probe;
pub(crate) mod types;
#[cfg(test)]
mod tests;

pub use ifd::{IFD, IFDEntry};
pub use probe::{probe_file, TiffSummary};
pub use reader::TiffReader;
pub use types::TIFF;
