//! Seekable reader trait
//!
//! The GeoTIFF probe jumps between the header, the IFD chain and tag
//! value arrays, so every reader it takes must support both reading and
//! seeking. Files and in-memory cursors both qualify.

use std::io::{Read, Seek};

/// Trait for readers that can both read and seek
pub trait SeekableReader: Read + Seek {}

impl<T: Read + Seek> SeekableReader for T {}
