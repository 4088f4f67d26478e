//! Tile addressing
//!
//! The single naming authority of the output folder. Every tile the tiler
//! writes or reads is named through [`address`]:
//!
//! ```text
//! R<row>C<column>[_<suffix>].tif
//! ```
//!
//! Row and column are 1-based and zero-padded to a fixed width. Level-0
//! tiles use no suffix (masked composite), `RGB` or `IR`; pyramid tiles
//! use `RGB_<level>` or `IR_<level>`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{TilerError, TilerResult};
use crate::raster::Band;

/// Position of a tile within its level's grid, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoordinate {
    pub column: u32,
    pub row: u32,
}

impl TileCoordinate {
    /// Create a coordinate, rejecting zero indices
    pub fn new(column: u32, row: u32) -> TilerResult<Self> {
        if column == 0 || row == 0 {
            return Err(TilerError::InvalidTileIndex { column, row });
        }
        Ok(TileCoordinate { column, row })
    }

    /// Coordinate of the 0-based grid cell `(column, row)`
    pub fn from_cell(column: u32, row: u32) -> Self {
        TileCoordinate {
            column: column + 1,
            row: row + 1,
        }
    }

    /// The 0-based grid cell of this coordinate
    pub fn cell(&self) -> (u32, u32) {
        (self.column - 1, self.row - 1)
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}C{}", self.row, self.column)
    }
}

/// Band composition of a tile file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Level-0 masked 4-band tile
    Composite,
    /// Band split of a level-0 tile
    Split(Band),
    /// Pyramid tile at a level of 1 or more
    Pyramid(Band, u32),
}

impl Variant {
    /// The variant holding `band` at `level`
    pub fn for_level(band: Band, level: u32) -> Variant {
        if level == 0 {
            Variant::Split(band)
        } else {
            Variant::Pyramid(band, level)
        }
    }

    /// File name suffix, without the leading underscore
    pub fn suffix(&self) -> Option<String> {
        match self {
            Variant::Composite => None,
            Variant::Split(band) => Some(band.tag().to_string()),
            Variant::Pyramid(band, level) => Some(format!("{}_{}", band.tag(), level)),
        }
    }

    /// Pyramid level of the variant
    pub fn level(&self) -> u32 {
        match self {
            Variant::Composite | Variant::Split(_) => 0,
            Variant::Pyramid(_, level) => *level,
        }
    }

    /// Band composition, `None` for the 4-band composite
    pub fn band(&self) -> Option<Band> {
        match self {
            Variant::Composite => None,
            Variant::Split(band) | Variant::Pyramid(band, _) => Some(*band),
        }
    }
}

/// Largest index that fits in `digits` decimal digits
pub fn max_index(digits: usize) -> u64 {
    10u64.saturating_pow(digits as u32) - 1
}

/// File name of a tile
///
/// # Arguments
/// * `column` - 1-based column
/// * `row` - 1-based row
/// * `digits` - Zero-pad width of both indices
/// * `suffix` - Variant suffix, appended after an underscore when non-empty
///
/// # Returns
/// `R<row>C<column>[_<suffix>].tif`, or an error when an index is zero or
/// does not fit in `digits` digits
pub fn address(column: u32, row: u32, digits: usize, suffix: Option<&str>) -> TilerResult<String> {
    if column == 0 || row == 0 {
        return Err(TilerError::InvalidTileIndex { column, row });
    }
    let limit = max_index(digits);
    if u64::from(column) > limit || u64::from(row) > limit {
        return Err(TilerError::PathOverflow { column, row, digits });
    }

    let mut name = format!("R{:0width$}C{:0width$}", row, column, width = digits);
    if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
        name.push('_');
        name.push_str(suffix);
    }
    name.push_str(".tif");
    Ok(name)
}

/// Resolves tile coordinates to paths inside one output folder
#[derive(Debug, Clone)]
pub struct TileNamer {
    folder: PathBuf,
    digits: usize,
}

impl TileNamer {
    pub fn new(folder: impl Into<PathBuf>, digits: usize) -> Self {
        TileNamer {
            folder: folder.into(),
            digits,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn digits(&self) -> usize {
        self.digits
    }

    /// File name of a tile
    pub fn file_name(&self, coordinate: TileCoordinate, variant: Variant) -> TilerResult<String> {
        let suffix = variant.suffix();
        address(coordinate.column, coordinate.row, self.digits, suffix.as_deref())
    }

    /// Path of a tile in the output folder
    pub fn path(&self, coordinate: TileCoordinate, variant: Variant) -> TilerResult<PathBuf> {
        Ok(self.folder.join(self.file_name(coordinate, variant)?))
    }

    /// Path of a working file derived from a tile name
    ///
    /// `R0001C0002.tif` with tag `raw` becomes `R0001C0002_raw.tif`; with
    /// an empty tag only the extension changes.
    pub fn scratch_path(
        &self,
        coordinate: TileCoordinate,
        variant: Variant,
        tag: &str,
        extension: &str,
    ) -> TilerResult<PathBuf> {
        let name = self.file_name(coordinate, variant)?;
        let stem = name.trim_end_matches(".tif");
        let file = if tag.is_empty() {
            format!("{}.{}", stem, extension)
        } else {
            format!("{}_{}.{}", stem, tag, extension)
        };
        Ok(self.folder.join(file))
    }
}
