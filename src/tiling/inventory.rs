//! Inventory of an output folder
//!
//! Classifies every `.tif` file of a folder by the tile naming scheme and
//! counts tiles per level and composition.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::TilerResult;
use crate::raster::Band;
use crate::tiling::address::{TileCoordinate, Variant};

lazy_static! {
    static ref TILE_NAME: Option<Regex> =
        Regex::new(r"^R(\d+)C(\d+)(?:_(RGB|IR|old)(?:_(\d+))?)?\.tif$").ok();
}

/// What a file name in the output folder denotes
#[derive(Debug, Clone, PartialEq)]
pub enum TileName {
    Tile(TileCoordinate, Variant),
    /// Unmasked crop renamed aside
    Original(TileCoordinate),
}

/// Parse a tile file name
///
/// Returns `None` for names outside the scheme, including zero indices
/// and a level of 0 on a pyramid suffix.
pub fn parse_tile_name(name: &str) -> Option<TileName> {
    let captures = TILE_NAME.as_ref()?.captures(name)?;
    let row: u32 = captures.get(1)?.as_str().parse().ok()?;
    let column: u32 = captures.get(2)?.as_str().parse().ok()?;
    let coordinate = TileCoordinate::new(column, row).ok()?;
    let level = match captures.get(4) {
        Some(level) => Some(level.as_str().parse::<u32>().ok().filter(|&l| l > 0)?),
        None => None,
    };

    let band = match captures.get(3).map(|m| m.as_str()) {
        None => return Some(TileName::Tile(coordinate, Variant::Composite)),
        Some("old") => {
            return match level {
                None => Some(TileName::Original(coordinate)),
                Some(_) => None,
            }
        }
        Some("RGB") => Band::Rgb,
        Some(_) => Band::Ir,
    };

    let variant = match level {
        Some(level) => Variant::Pyramid(band, level),
        None => Variant::Split(band),
    };
    Some(TileName::Tile(coordinate, variant))
}

/// Tile counts of one output folder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    /// Level-0 masked composites
    pub composites: usize,
    /// Tiles per (level, composition)
    pub tiles: BTreeMap<(u32, Band), usize>,
    /// Unmasked crops renamed aside
    pub originals: usize,
    /// `.tif` files outside the naming scheme
    pub foreign: Vec<String>,
}

impl Inventory {
    /// Scan `folder`
    pub fn scan(folder: &Path) -> TilerResult<Self> {
        let mut names = Vec::new();
        for entry in fs::read_dir(folder)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(Self::from_names(names.iter().map(String::as_str)))
    }

    /// Classify a list of file names; only `.tif` names are considered
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut inventory = Inventory::default();
        for name in names.into_iter().filter(|name| name.ends_with(".tif")) {
            match parse_tile_name(name) {
                Some(TileName::Tile(_, Variant::Composite)) => inventory.composites += 1,
                Some(TileName::Tile(_, variant)) => {
                    if let Some(band) = variant.band() {
                        *inventory.tiles.entry((variant.level(), band)).or_insert(0) += 1;
                    }
                }
                Some(TileName::Original(_)) => inventory.originals += 1,
                None => inventory.foreign.push(name.to_string()),
            }
        }
        inventory
    }

    /// Tiles of `band` at `level`
    pub fn count(&self, level: u32, band: Band) -> usize {
        self.tiles.get(&(level, band)).copied().unwrap_or(0)
    }

    /// Highest level holding at least one tile
    pub fn max_level(&self) -> Option<u32> {
        self.tiles.keys().map(|&(level, _)| level).max()
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Masked composites: {}", self.composites)?;
        for ((level, band), count) in &self.tiles {
            writeln!(f, "Level {} {}: {}", level, band, count)?;
        }
        if self.originals > 0 {
            writeln!(f, "Unmasked originals: {}", self.originals)?;
        }
        if !self.foreign.is_empty() {
            writeln!(f, "Foreign files: {}", self.foreign.len())?;
            for name in &self.foreign {
                writeln!(f, "  {}", name)?;
            }
        }
        Ok(())
    }
}
