//! Byte cursor over a WebAssembly binary
//!
//! LEB128 integers, little-endian floats and length-prefixed names, all
//! reported as `io::Error` so that section decoders can `?` through them.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io;

pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of section or function")
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    // Basic operations --------------------------------------------------------

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn has_at_least(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_byte(&mut self) -> Result<u8, io::Error> {
        let byte = *self.bytes.get(self.pos).ok_or_else(eof)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn skip(&mut self, len: usize) -> Result<(), io::Error> {
        if !self.has_at_least(len) {
            return Err(eof());
        }
        self.pos += len;
        Ok(())
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], io::Error> {
        if !self.has_at_least(len) {
            return Err(eof());
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Split off the next `len` bytes as an independent reader, advancing past them.
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader<'a>, io::Error> {
        self.read_bytes(len).map(Reader::new)
    }

    // Read and interpret types ------------------------------------------------

    // le
    pub fn read_u32(&mut self) -> Result<u32, io::Error> {
        let mut bytes = self.read_bytes(4)?;
        bytes.read_u32::<LittleEndian>()
    }

    pub fn read_vu32(&mut self) -> Result<u32, io::Error> {
        self.read_vu(32).map(|v| v as u32)
    }

    pub fn read_vs32(&mut self) -> Result<i32, io::Error> {
        self.read_vs(32).map(|v| v as i32)
    }

    pub fn read_vs64(&mut self) -> Result<i64, io::Error> {
        self.read_vs(64)
    }

    pub fn read_f32(&mut self) -> Result<f32, io::Error> {
        let mut bytes = self.read_bytes(4)?;
        bytes.read_f32::<LittleEndian>()
    }

    pub fn read_f64(&mut self) -> Result<f64, io::Error> {
        let mut bytes = self.read_bytes(8)?;
        bytes.read_f64::<LittleEndian>()
    }

    pub fn read_string(&mut self) -> Result<String, io::Error> {
        let len = self.read_vu32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed UTF-8 encoding"))
    }

    fn read_vu(&mut self, size: u32) -> Result<u64, io::Error> {
        let max_bytes = (size + 6) / 7;
        let mut result: u64 = 0;
        let mut shift = 0;

        for i in 0..max_bytes {
            let byte = self.read_byte()?;
            let last = i == max_bytes - 1;
            // unused bits of the final byte must be zero
            if last && size < 64 && (byte as u64) >> (size - shift) != 0 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "integer too large"));
            }
            if last && size == 64 && byte & 0x7e != 0 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "integer too large"));
            }
            result |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(io::Error::new(io::ErrorKind::InvalidData, "integer representation too long"))
    }

    fn read_vs(&mut self, size: u32) -> Result<i64, io::Error> {
        let max_bytes = (size + 6) / 7;
        let mut result: i64 = 0;
        let mut shift = 0;

        for i in 0..max_bytes {
            let byte = self.read_byte()?;
            let last = i == max_bytes - 1;
            if last {
                // the unused bits must be a sign extension of the final value bit
                let value_bits = size - shift;
                let rest = (((byte << 1) as i8) >> 1) >> (value_bits - 1);
                if byte & 0x80 != 0 || (rest != 0 && rest != -1) {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, "integer too large"));
                }
            }
            result |= ((byte & 0x7f) as i64) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
        }

        Err(io::Error::new(io::ErrorKind::InvalidData, "integer representation too long"))
    }
}
