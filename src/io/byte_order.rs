//! Byte order of a TIFF file
//!
//! The first two bytes of the header are `II` or `MM`. Everything after
//! them is decoded through a [`ByteOrderHandler`] picked from that marker.

use std::io::Result;
use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder as Endianness, LittleEndian, ReadBytesExt};

use crate::errors::{TilerError, TilerResult};
use crate::io::seekable::SeekableReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `II`
    LittleEndian,
    /// `MM`
    BigEndian,
}

impl ByteOrder {
    /// Read the two-byte marker at the current position
    ///
    /// Both markers are palindromes, so the order they are read in does not matter.
    pub fn detect(reader: &mut dyn SeekableReader) -> TilerResult<Self> {
        let marker = reader.read_u16::<LittleEndian>()?;
        match &marker.to_le_bytes() {
            b"II" => Ok(ByteOrder::LittleEndian),
            b"MM" => Ok(ByteOrder::BigEndian),
            _ => Err(TilerError::InvalidByteOrder(marker)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ByteOrder::LittleEndian => "little-endian (II)",
            ByteOrder::BigEndian => "big-endian (MM)",
        }
    }

    pub fn create_handler(&self) -> Box<dyn ByteOrderHandler> {
        match self {
            ByteOrder::LittleEndian => Box::new(LittleEndianHandler::new()),
            ByteOrder::BigEndian => Box::new(BigEndianHandler::new()),
        }
    }
}

/// The fixed-width reads an IFD walk needs
pub trait ByteOrderHandler: Send + Sync {
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16>;
    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32>;
    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64>;
    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64>;
}

/// Handler decoding every value in the byte order `E`
pub struct EndianHandler<E>(PhantomData<E>);

pub type LittleEndianHandler = EndianHandler<LittleEndian>;
pub type BigEndianHandler = EndianHandler<BigEndian>;

impl<E> EndianHandler<E> {
    pub const fn new() -> Self {
        EndianHandler(PhantomData)
    }
}

impl<E: Endianness + Send + Sync> ByteOrderHandler for EndianHandler<E> {
    fn read_u16(&self, reader: &mut dyn SeekableReader) -> Result<u16> {
        reader.read_u16::<E>()
    }

    fn read_u32(&self, reader: &mut dyn SeekableReader) -> Result<u32> {
        reader.read_u32::<E>()
    }

    fn read_u64(&self, reader: &mut dyn SeekableReader) -> Result<u64> {
        reader.read_u64::<E>()
    }

    fn read_f64(&self, reader: &mut dyn SeekableReader) -> Result<f64> {
        reader.read_f64::<E>()
    }
}
