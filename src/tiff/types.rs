//! Core TIFF data structures

use std::fmt;

use crate::io::byte_order::ByteOrder;
use crate::tiff::ifd::IFD;

/// A TIFF file reduced to its Image File Directories
#[derive(Debug)]
pub struct TIFF {
    /// Image File Directories in chain order
    pub ifds: Vec<IFD>,
    /// Whether this is a BigTIFF
    pub is_big_tiff: bool,
    /// Byte order declared in the header
    pub byte_order: ByteOrder,
}

impl TIFF {
    /// Creates a new empty TIFF structure
    pub fn new(is_big_tiff: bool, byte_order: ByteOrder) -> Self {
        TIFF {
            ifds: Vec::new(),
            is_big_tiff,
            byte_order,
        }
    }

    /// Returns the main (first) IFD if available
    pub fn main_ifd(&self) -> Option<&IFD> {
        self.ifds.first()
    }

    /// Returns the number of IFDs in the TIFF file
    pub fn ifd_count(&self) -> usize {
        self.ifds.len()
    }

    /// Reduced-resolution IFDs of the image data, masks excluded
    pub fn overviews(&self) -> Vec<&IFD> {
        self.ifds.iter().skip(1).filter(|ifd| ifd.is_overview()).collect()
    }

    /// Internal transparency masks, including mask overviews
    pub fn masks(&self) -> Vec<&IFD> {
        self.ifds.iter().filter(|ifd| ifd.is_mask()).collect()
    }
}

impl fmt::Display for TIFF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TIFF File:")?;
        writeln!(f, "  Format: {}", if self.is_big_tiff { "BigTIFF" } else { "TIFF" })?;
        writeln!(f, "  Byte order: {}", self.byte_order.name())?;
        writeln!(f, "  Number of IFDs: {}", self.ifds.len())?;
        for ifd in &self.ifds {
            writeln!(f, "  {}", ifd)?;
        }
        Ok(())
    }
}
