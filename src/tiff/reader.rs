//! TIFF file reader
//!
//! Reads the header and the full IFD chain of a TIFF or BigTIFF file, using
//! the Strategy pattern for byte order. DOUBLE arrays stored outside the IFD
//! are read on demand with [`TiffReader::read_doubles`].
//!
//! Entry counts come straight from the file and are never trusted: an array
//! that cannot fit in the file is rejected as [`TilerError::InvalidHeader`].

use std::io::{Cursor, SeekFrom};

use log::{debug, warn};

use crate::errors::{TilerError, TilerResult};
use crate::io::byte_order::{ByteOrder, ByteOrderHandler};
use crate::io::seekable::SeekableReader;
use crate::tiff::constants::{field_types, header, MAX_IFDS};
use crate::tiff::ifd::{IFD, IFDEntry};
use crate::tiff::types::TIFF;

/// Reader for TIFF and BigTIFF files
pub struct TiffReader {
    /// Byte order handler, set once the header has been read
    handler: Option<Box<dyn ByteOrderHandler>>,
    /// Whether the file being read is BigTIFF
    is_big_tiff: bool,
    /// Length of the file being read
    file_size: u64,
}

impl TiffReader {
    /// Creates a new TIFF reader
    pub fn new() -> Self {
        TiffReader {
            handler: None,
            is_big_tiff: false,
            file_size: 0,
        }
    }

    fn handler(&self) -> TilerResult<&dyn ByteOrderHandler> {
        self.handler
            .as_deref()
            .ok_or_else(|| TilerError::GenericError("Byte order not yet determined".to_string()))
    }

    /// Reads the header and all IFDs from the given reader
    ///
    /// # Arguments
    /// * `reader` - Any reader positioned anywhere; it is rewound first
    ///
    /// # Returns
    /// A TIFF structure listing every IFD in the chain
    pub fn read(&mut self, reader: &mut dyn SeekableReader) -> TilerResult<TIFF> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        self.file_size = file_size;

        let byte_order = ByteOrder::detect(reader)?;
        debug!("Detected byte order: {}", byte_order.name());
        self.handler = Some(byte_order.create_handler());

        let first_offset = self.read_header(reader)?;
        if first_offset < 8 || first_offset >= file_size {
            return Err(TilerError::InvalidHeader);
        }

        let mut tiff = TIFF::new(self.is_big_tiff, byte_order);
        let mut offset = first_offset;
        while offset != 0 && tiff.ifds.len() < MAX_IFDS {
            if offset >= file_size {
                warn!("IFD offset {} exceeds file size {}, stopping IFD chain", offset, file_size);
                break;
            }
            let (ifd, next) = self.read_ifd(reader, offset, tiff.ifds.len())?;
            debug!("Read {}", ifd);
            tiff.ifds.push(ifd);
            offset = next;
        }

        Ok(tiff)
    }

    /// Reads the version and first IFD offset
    fn read_header(&mut self, reader: &mut dyn SeekableReader) -> TilerResult<u64> {
        let handler = self.handler()?;
        let version = handler.read_u16(reader)?;
        match version {
            header::TIFF_VERSION => {
                let offset = handler.read_u32(reader)? as u64;
                self.is_big_tiff = false;
                Ok(offset)
            }
            header::BIG_TIFF_VERSION => {
                let offset_size = handler.read_u16(reader)?;
                let reserved = handler.read_u16(reader)?;
                if offset_size != header::BIGTIFF_OFFSET_SIZE || reserved != 0 {
                    return Err(TilerError::InvalidHeader);
                }
                let offset = handler.read_u64(reader)?;
                self.is_big_tiff = true;
                Ok(offset)
            }
            _ => Err(TilerError::UnsupportedVersion(version)),
        }
    }

    /// Reads one IFD and returns it with the offset of the next one
    fn read_ifd(&self, reader: &mut dyn SeekableReader, offset: u64, number: usize) -> TilerResult<(IFD, u64)> {
        reader.seek(SeekFrom::Start(offset))?;
        let handler = self.handler()?;

        let entry_count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u16(reader)? as u64
        };
        let entry_size = if self.is_big_tiff { 20 } else { 12 };
        if entry_count.checked_mul(entry_size).map_or(true, |size| size > self.file_size) {
            warn!("IFD {} at offset {} declares {} entries, more than the file holds", number, offset, entry_count);
            return Err(TilerError::InvalidHeader);
        }

        let mut ifd = IFD::new(number, offset);
        for _ in 0..entry_count {
            ifd.add_entry(self.read_entry(reader)?);
        }

        let next = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u32(reader)? as u64
        };

        Ok((ifd, next))
    }

    /// Reads a single IFD entry, decoding its first value when inline
    fn read_entry(&self, reader: &mut dyn SeekableReader) -> TilerResult<IFDEntry> {
        let handler = self.handler()?;

        let tag = handler.read_u16(reader)?;
        let field_type = handler.read_u16(reader)?;
        let count = if self.is_big_tiff {
            handler.read_u64(reader)?
        } else {
            handler.read_u32(reader)? as u64
        };

        let width = if self.is_big_tiff { 8 } else { 4 };
        let mut raw = [0u8; 8];
        reader.read_exact(&mut raw[..width])?;

        let mut cursor = Cursor::new(&raw[..width]);
        let value_offset = if self.is_big_tiff {
            handler.read_u64(&mut cursor)?
        } else {
            handler.read_u32(&mut cursor)? as u64
        };

        let mut entry = IFDEntry::new(tag, field_type, count, value_offset);
        entry.raw = raw;
        if count >= 1 && entry.is_value_inline(self.is_big_tiff) {
            let mut cursor = Cursor::new(&raw[..width]);
            entry.inline_value = self.decode_value(&mut cursor, field_type).ok();
        }

        Ok(entry)
    }

    /// Decodes one integer value of the given field type
    fn decode_value(&self, reader: &mut dyn SeekableReader, field_type: u16) -> TilerResult<u64> {
        let handler = self.handler()?;
        let value = match field_type {
            field_types::BYTE | field_types::SBYTE | field_types::UNDEFINED | field_types::ASCII => {
                let mut byte = [0u8; 1];
                reader.read_exact(&mut byte)?;
                byte[0] as u64
            }
            field_types::SHORT | field_types::SSHORT => handler.read_u16(reader)? as u64,
            field_types::LONG | field_types::SLONG => handler.read_u32(reader)? as u64,
            field_types::LONG8 | field_types::SLONG8 | field_types::IFD8 => handler.read_u64(reader)?,
            _ => return Err(TilerError::UnsupportedFieldType(field_type)),
        };
        Ok(value)
    }

    /// Reads all DOUBLE values of an entry
    ///
    /// GeoTIFF stores pixel scale, tiepoints and the model transformation
    /// as DOUBLE arrays.
    pub fn read_doubles(&self, reader: &mut dyn SeekableReader, entry: &IFDEntry) -> TilerResult<Vec<f64>> {
        if entry.field_type != field_types::DOUBLE {
            return Err(TilerError::UnsupportedFieldType(entry.field_type));
        }
        let handler = self.handler()?;
        let inline = entry.is_value_inline(self.is_big_tiff);
        if !inline && !self.fits_in_file(entry) {
            warn!(
                "Tag {} declares {} values at offset {}, past the end of a {} byte file",
                entry.tag, entry.count, entry.value_offset, self.file_size
            );
            return Err(TilerError::InvalidHeader);
        }
        let mut values = Vec::with_capacity(entry.count.min(self.file_size / 8) as usize);

        if inline {
            let mut cursor = Cursor::new(&entry.raw[..]);
            for _ in 0..entry.count {
                values.push(handler.read_f64(&mut cursor)?);
            }
        } else {
            reader.seek(SeekFrom::Start(entry.value_offset))?;
            for _ in 0..entry.count {
                values.push(handler.read_f64(reader)?);
            }
        }

        Ok(values)
    }

    /// Whether an out-of-line value array lies entirely inside the file
    fn fits_in_file(&self, entry: &IFDEntry) -> bool {
        entry
            .byte_size()
            .and_then(|size| size.checked_add(entry.value_offset))
            .map_or(false, |end| end <= self.file_size)
    }
}

impl Default for TiffReader {
    fn default() -> Self {
        Self::new()
    }
}
