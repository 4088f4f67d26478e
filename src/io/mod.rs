//! Low-level readers used by the GeoTIFF probe

pub mod seekable;
pub mod byte_order;
