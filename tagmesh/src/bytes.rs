//! Utilities for decoding from and encoding into bytes.
//!
//! This module defines the zero-copy (de)serialization traits [`ToBytes`] and [`FromBytes`], as
//! well as the helper structs [`ByteWriter`] and [`ByteReader`], which wrap a `&mut [u8]` or
//! `&[u8]` and offer useful utilities to read and write values.
//!
//! Types that cross one of the node's serial links implement [`ToBytes`] and [`FromBytes`]: the
//! tag-update frames sent to the manager, and the reply/notification payloads exchanged with the
//! mesh radio. Multi-byte integers on those links travel in network order, so the 16- and 32-bit
//! accessors here are big-endian.

use byteorder::{BigEndian, ByteOrder};

use crate::Error;

/// Trait for encoding a value into a byte buffer.
pub trait ToBytes {
    /// Converts `self` to bytes and writes them into `writer`, advancing `writer` to point past
    /// the encoded value.
    ///
    /// If `writer` does not contain enough space, an error will be returned and the state of the
    /// buffer is unspecified (eg. `self` may be partially written into `writer`).
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error>;
}

/// Trait for decoding values from a byte slice.
pub trait FromBytes<'a>: Sized {
    /// Decode a `Self` from a byte slice, advancing `bytes` to point past the data that was read.
    ///
    /// If `bytes` contains data not valid for the target type, or contains an insufficient number
    /// of bytes, an error will be returned and the state of `bytes` is unspecified (it can point
    /// to arbitrary data).
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error>;
}

/// Wrapper around a `&mut [u8]` that allows writing values to the front.
pub struct ByteWriter<'a>(&'a mut [u8]);

impl<'a> ByteWriter<'a> {
    /// Creates a writer that will write to `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        ByteWriter(buf)
    }

    /// Returns the number of bytes that can be written until the buffer is full.
    pub fn space_left(&self) -> usize {
        self.0.len()
    }

    /// Writes all bytes from `slice` to `self`.
    ///
    /// Returns `Error::Eof` when `self` does not have enough space left to fit `slice`. In that
    /// case, no bytes are written.
    pub fn write_slice(&mut self, slice: &[u8]) -> Result<(), Error> {
        if self.space_left() < slice.len() {
            return Err(Error::Eof);
        }

        let this = core::mem::replace(&mut self.0, &mut []);
        let (dst, rest) = this.split_at_mut(slice.len());
        dst.copy_from_slice(slice);
        self.0 = rest;
        Ok(())
    }

    /// Writes a single byte to `self`.
    ///
    /// Returns `Error::Eof` when no space is left.
    pub fn write_u8(&mut self, byte: u8) -> Result<(), Error> {
        self.write_slice(&[byte])
    }

    /// Writes a `u16` to `self`, in network (big-endian) byte order.
    pub fn write_u16_be(&mut self, value: u16) -> Result<(), Error> {
        let mut bytes = [0; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.write_slice(&bytes)
    }

    /// Writes a `u32` to `self`, in network (big-endian) byte order.
    pub fn write_u32_be(&mut self, value: u32) -> Result<(), Error> {
        let mut bytes = [0; 4];
        BigEndian::write_u32(&mut bytes, value);
        self.write_slice(&bytes)
    }
}

/// Wrapper around a `&[u8]` that can be used to read data from the front.
pub struct ByteReader<'a>(&'a [u8]);

impl<'a> ByteReader<'a> {
    /// Creates a new reader that will read from the given byte slice.
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader(bytes)
    }

    /// Returns a reference to the raw bytes this reader would read next.
    pub fn as_raw_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// Returns the number of bytes that can still be read.
    pub fn bytes_left(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the reader is at the end of the underlying buffer.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads `len` bytes from the front of `self`.
    ///
    /// Returns `Error::Eof` when fewer than `len` bytes are left.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.bytes_left() < len {
            return Err(Error::Eof);
        }

        let (slice, rest) = self.0.split_at(len);
        self.0 = rest;
        Ok(slice)
    }

    /// Reads a single byte from the front of `self`.
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_slice(1)?[0])
    }

    /// Reads a `u16` in network (big-endian) byte order from the front of `self`.
    pub fn read_u16_be(&mut self) -> Result<u16, Error> {
        Ok(BigEndian::read_u16(self.read_slice(2)?))
    }

    /// Reads a `u32` in network (big-endian) byte order from the front of `self`.
    pub fn read_u32_be(&mut self) -> Result<u32, Error> {
        Ok(BigEndian::read_u32(self.read_slice(4)?))
    }

    /// Reads the remaining bytes, leaving the reader at EOF.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = self.0;
        self.0 = &[];
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_integers_round_trip() {
        let mut buf = [0; 6];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u16_be(0xf0b8).unwrap();
        writer.write_u32_be(0xdead_beef).unwrap();
        assert_eq!(writer.space_left(), 0);

        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u16_be().unwrap(), 0xf0b8);
        assert_eq!(reader.read_u32_be().unwrap(), 0xdead_beef);
        assert!(reader.is_empty());
    }

    #[test]
    fn wire_integers_network_order() {
        let mut buf = [0; 2];
        ByteWriter::new(&mut buf).write_u16_be(0x1234).unwrap();
        assert_eq!(buf, [0x12, 0x34]);
    }

    #[test]
    fn writer_eof_leaves_buffer_unchanged() {
        let mut buf = [0xaa; 2];
        let mut writer = ByteWriter::new(&mut buf);
        assert_eq!(writer.write_slice(&[1, 2, 3]), Err(Error::Eof));
        assert_eq!(writer.space_left(), 2);
        drop(writer);
        assert_eq!(buf, [0xaa, 0xaa]);
    }

    #[test]
    fn reader_eof() {
        let mut reader = ByteReader::new(&[1]);
        assert_eq!(reader.read_u16_be(), Err(Error::Eof));
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u8(), Err(Error::Eof));
    }
}
