//! Band compositions of the split tile outputs

use std::fmt;

/// Band composition of a split tile
///
/// The masked composite tile carries four bands (red, green, blue and
/// near infrared). Every composite is split into an RGB tile and an IR
/// tile, and the pyramid is built for each composition independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    /// Bands 1-3 of the composite
    Rgb,
    /// Band 4 of the composite
    Ir,
}

impl Band {
    /// Both compositions, in the order they are produced
    pub const ALL: [Band; 2] = [Band::Rgb, Band::Ir];

    /// File name tag of this composition
    pub fn tag(&self) -> &'static str {
        match self {
            Band::Rgb => "RGB",
            Band::Ir => "IR",
        }
    }

    /// 1-based composite band indices this composition selects
    pub fn source_bands(&self) -> &'static [u32] {
        match self {
            Band::Rgb => &[1, 2, 3],
            Band::Ir => &[4],
        }
    }

    /// Number of bands in a tile of this composition
    pub fn band_count(&self) -> usize {
        self.source_bands().len()
    }

    /// Whether the composition is photometric color (YCbCr-compressed)
    pub fn is_color(&self) -> bool {
        matches!(self, Band::Rgb)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Data bands of a masked composite tile (red, green, blue, near infrared)
pub const COMPOSITE_BAND_COUNT: usize = 4;
