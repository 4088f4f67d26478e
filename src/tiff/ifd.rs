//! Image File Directory (IFD) structures
//!
//! An IFD is a list of tag entries describing one image in the file. A
//! GeoTIFF tile written by the tiler has one IFD for the full-resolution
//! image, plus one per internal overview and one per internal mask.

use std::collections::HashMap;
use std::fmt;

use log::trace;

use crate::tiff::constants::{field_types, new_subfile_type, tags};

/// Represents an entry in an Image File Directory (IFD)
#[derive(Debug, Clone)]
pub struct IFDEntry {
    /// TIFF tag identifier
    pub tag: u16,
    /// Field type
    pub field_type: u16,
    /// Number of values
    pub count: u64,
    /// Value field interpreted as an offset into the file
    pub value_offset: u64,
    /// First value decoded in the file's byte order, when stored inline
    pub inline_value: Option<u64>,
    /// Raw bytes of the value field (4 used for classic TIFF, 8 for BigTIFF)
    pub raw: [u8; 8],
}

impl IFDEntry {
    /// Creates a new IFD entry
    pub fn new(tag: u16, field_type: u16, count: u64, value_offset: u64) -> Self {
        Self {
            tag,
            field_type,
            count,
            value_offset,
            inline_value: None,
            raw: [0; 8],
        }
    }

    /// Size in bytes of a single value of this entry's field type
    pub fn field_type_size(&self) -> u64 {
        match self.field_type {
            field_types::BYTE | field_types::ASCII | field_types::SBYTE | field_types::UNDEFINED => 1,
            field_types::SHORT | field_types::SSHORT => 2,
            field_types::LONG | field_types::SLONG | field_types::FLOAT => 4,
            field_types::RATIONAL | field_types::SRATIONAL | field_types::DOUBLE => 8,
            field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => 8,
            _ => 1,
        }
    }

    /// Total size in bytes of the entry's values, `None` on overflow
    pub fn byte_size(&self) -> Option<u64> {
        self.field_type_size().checked_mul(self.count)
    }

    /// Determines if the value is stored in the entry itself
    pub fn is_value_inline(&self, is_big_tiff: bool) -> bool {
        let inline_size = if is_big_tiff { 8 } else { 4 };
        self.byte_size().map_or(false, |size| size <= inline_size)
    }
}

/// Represents an Image File Directory (IFD) in a TIFF file
#[derive(Debug, Clone)]
pub struct IFD {
    /// Entries in this IFD
    pub entries: Vec<IFDEntry>,
    /// IFD number (0-based)
    pub number: usize,
    /// Offset to this IFD in the file
    pub offset: u64,
    /// Index into `entries` by tag
    tag_map: HashMap<u16, usize>,
}

impl IFD {
    /// Creates a new, empty IFD
    pub fn new(number: usize, offset: u64) -> Self {
        Self {
            entries: Vec::new(),
            number,
            offset,
            tag_map: HashMap::new(),
        }
    }

    /// Adds an entry to this IFD
    pub fn add_entry(&mut self, entry: IFDEntry) {
        trace!("IFD #{}: tag={} type={} count={}", self.number, entry.tag, entry.field_type, entry.count);
        self.tag_map.insert(entry.tag, self.entries.len());
        self.entries.push(entry);
    }

    /// Gets an IFD entry by tag
    pub fn get_entry(&self, tag: u16) -> Option<&IFDEntry> {
        self.tag_map.get(&tag).map(|&index| &self.entries[index])
    }

    /// Gets the inline value of a single-valued tag
    pub fn get_tag_value(&self, tag: u16) -> Option<u64> {
        self.get_entry(tag).and_then(|entry| entry.inline_value)
    }

    /// Width and height of the image described by this IFD
    pub fn get_dimensions(&self) -> Option<(u64, u64)> {
        let width = self.get_tag_value(tags::IMAGE_WIDTH)?;
        let height = self.get_tag_value(tags::IMAGE_LENGTH)?;
        Some((width, height))
    }

    /// Number of samples per pixel, 1 when the tag is absent
    pub fn get_samples_per_pixel(&self) -> u64 {
        self.get_tag_value(tags::SAMPLES_PER_PIXEL).unwrap_or(1)
    }

    /// NewSubfileType flags, 0 when the tag is absent
    pub fn subfile_type(&self) -> u64 {
        self.get_tag_value(tags::NEW_SUBFILE_TYPE).unwrap_or(0)
    }

    /// Whether this IFD is a reduced-resolution overview of image data
    pub fn is_overview(&self) -> bool {
        let kind = self.subfile_type();
        kind & new_subfile_type::REDUCED_RESOLUTION != 0 && kind & new_subfile_type::TRANSPARENCY_MASK == 0
    }

    /// Whether this IFD is an internal transparency mask
    pub fn is_mask(&self) -> bool {
        self.subfile_type() & new_subfile_type::TRANSPARENCY_MASK != 0
    }
}

impl fmt::Display for IFD {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IFD #{} (offset: {}, {} entries", self.number, self.offset, self.entries.len())?;
        if let Some((width, height)) = self.get_dimensions() {
            write!(f, ", {}x{}x{}", width, height, self.get_samples_per_pixel())?;
        }
        write!(f, ")")
    }
}
