//! Error types for tiling and pyramid construction

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors raised while tiling a raster or building its pyramid
#[derive(Debug)]
pub enum TilerError {
    /// I/O error
    IoError(io::Error),
    /// Invalid TIFF header
    InvalidHeader,
    /// Invalid byte order marker
    InvalidByteOrder(u16),
    /// Unsupported TIFF version
    UnsupportedVersion(u16),
    /// Tag not found
    TagNotFound(u16),
    /// Unsupported field type
    UnsupportedFieldType(u16),
    /// An external raster operator exited non-zero or could not be started
    OperatorFailure {
        /// Name of the operator (crop, rasterize, ...)
        operator: String,
        /// Full command line, for reproducing the failure by hand
        command: String,
        /// Exit status, `None` when the process never ran or was killed
        status: Option<i32>,
        /// Captured stdout/stderr
        output: String,
    },
    /// A block references a tile that was never produced
    MissingInputTile(PathBuf),
    /// Tile index does not fit in the zero-padded width
    PathOverflow {
        column: u32,
        row: u32,
        digits: usize,
    },
    /// Tile indices are 1-based
    InvalidTileIndex {
        column: u32,
        row: u32,
    },
    /// Aggregated tile does not cover the union of its inputs
    ExtentMismatch {
        expected: [f64; 4],
        actual: [f64; 4],
    },
    /// Configuration rejected during validation
    InvalidConfig(String),
    /// Generic error with message
    GenericError(String),
}

impl fmt::Display for TilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TilerError::IoError(e) => write!(f, "I/O error: {}", e),
            TilerError::InvalidHeader => write!(f, "Invalid TIFF header"),
            TilerError::InvalidByteOrder(v) => write!(f, "Invalid byte order marker: {:#06x}", v),
            TilerError::UnsupportedVersion(v) => write!(f, "Unsupported TIFF version: {}", v),
            TilerError::TagNotFound(tag) => write!(f, "Tag not found: {}", tag),
            TilerError::UnsupportedFieldType(ft) => write!(f, "Unsupported field type: {}", ft),
            TilerError::OperatorFailure { operator, command, status, output } => {
                match status {
                    Some(code) => write!(f, "{} failed with exit code {}: {}", operator, code, command)?,
                    None => write!(f, "{} failed: {}", operator, command)?,
                }
                if !output.trim().is_empty() {
                    write!(f, "\n{}", output.trim_end())?;
                }
                Ok(())
            }
            TilerError::MissingInputTile(path) => write!(f, "Missing input tile: {}", path.display()),
            TilerError::PathOverflow { column, row, digits } => write!(
                f,
                "Tile index C{} R{} does not fit in {} digits",
                column, row, digits
            ),
            TilerError::InvalidTileIndex { column, row } => write!(
                f,
                "Invalid tile index C{} R{}: indices start at 1",
                column, row
            ),
            TilerError::ExtentMismatch { expected, actual } => write!(
                f,
                "Extent mismatch: expected [{:.6}, {:.6}, {:.6}, {:.6}], got [{:.6}, {:.6}, {:.6}, {:.6}]",
                expected[0], expected[1], expected[2], expected[3],
                actual[0], actual[1], actual[2], actual[3]
            ),
            TilerError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            TilerError::GenericError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TilerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TilerError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TilerError {
    fn from(error: io::Error) -> Self {
        TilerError::IoError(error)
    }
}

impl From<String> for TilerError {
    fn from(msg: String) -> Self {
        TilerError::GenericError(msg)
    }
}

/// Result type for tiling operations
pub type TilerResult<T> = Result<T, TilerError>;
