//! Unpacker
//!
//! Reads PackStream markers and primitive values from a message buffer.

use bytes::{Buf, Bytes};

use crate::error::{BoltError, Result};
use super::marker::*;

/// Deepest nesting of lists, maps and structures accepted in one message
pub const MAX_NESTING_DEPTH: usize = 256;

/// Reads encoded values from one complete message
pub struct Unpacker {
    buf: Bytes,
    depth: usize,
}

impl Unpacker {
    pub fn new(buf: Bytes) -> Self {
        Self { buf, depth: 0 }
    }

    /// Enter one level of value nesting
    pub fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(BoltError::Protocol(format!(
                "Value nesting exceeds {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn peek_marker(&self) -> Result<u8> {
        self.buf
            .first()
            .copied()
            .ok_or_else(|| BoltError::Protocol("Unexpected end of message".to_string()))
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(BoltError::Protocol(format!(
                "Unexpected end of message: needed {} bytes, {} left",
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn read_size(&mut self, width: usize) -> Result<usize> {
        self.need(width)?;
        Ok(match width {
            1 => self.buf.get_u8() as usize,
            2 => self.buf.get_u16() as usize,
            _ => self.buf.get_u32() as usize,
        })
    }

    /// Read a structure header: (field count, tag)
    pub fn unpack_struct_header(&mut self) -> Result<(usize, u8)> {
        let marker = self.read_u8()?;
        let size = match marker {
            m if m & 0xF0 == TINY_STRUCT => (m & 0x0F) as usize,
            STRUCT_8 => self.read_size(1)?,
            STRUCT_16 => self.read_size(2)?,
            other => return Err(unexpected("Structure", other)),
        };
        let tag = self.read_u8()?;
        Ok((size, tag))
    }

    pub fn unpack_int(&mut self) -> Result<i64> {
        let marker = self.read_u8()?;
        self.int_after_marker(marker)
    }

    /// Integer that must fit in 32 bits
    pub fn unpack_i32(&mut self, field: &str) -> Result<i32> {
        let value = self.unpack_int()?;
        i32::try_from(value)
            .map_err(|_| BoltError::Protocol(format!("{} out of range: {}", field, value)))
    }

    pub(crate) fn int_after_marker(&mut self, marker: u8) -> Result<i64> {
        let value = marker as i8 as i64;
        if (TINY_INT_MIN..=TINY_INT_MAX).contains(&value) {
            return Ok(value);
        }
        match marker {
            INT_8 => {
                self.need(1)?;
                Ok(self.buf.get_i8() as i64)
            }
            INT_16 => {
                self.need(2)?;
                Ok(self.buf.get_i16() as i64)
            }
            INT_32 => {
                self.need(4)?;
                Ok(self.buf.get_i32() as i64)
            }
            INT_64 => {
                self.need(8)?;
                Ok(self.buf.get_i64())
            }
            other => Err(unexpected("Integer", other)),
        }
    }

    pub fn unpack_float(&mut self) -> Result<f64> {
        match self.read_u8()? {
            FLOAT_64 => self.float_after_marker(),
            other => Err(unexpected("Float", other)),
        }
    }

    pub(crate) fn float_after_marker(&mut self) -> Result<f64> {
        self.need(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn unpack_string(&mut self) -> Result<String> {
        let marker = self.read_u8()?;
        self.string_after_marker(marker)
    }

    pub(crate) fn string_after_marker(&mut self, marker: u8) -> Result<String> {
        let len = match marker {
            m if m & 0xF0 == TINY_STRING => (m & 0x0F) as usize,
            STRING_8 => self.read_size(1)?,
            STRING_16 => self.read_size(2)?,
            STRING_32 => self.read_size(4)?,
            other => return Err(unexpected("String", other)),
        };
        self.need(len)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec())
            .map_err(|e| BoltError::Protocol(format!("Invalid UTF-8 in string: {}", e)))
    }

    pub(crate) fn bytes_after_marker(&mut self, marker: u8) -> Result<Vec<u8>> {
        let len = match marker {
            BYTES_8 => self.read_size(1)?,
            BYTES_16 => self.read_size(2)?,
            BYTES_32 => self.read_size(4)?,
            other => return Err(unexpected("Bytes", other)),
        };
        self.need(len)?;
        Ok(self.buf.split_to(len).to_vec())
    }

    pub fn unpack_list_header(&mut self) -> Result<usize> {
        let marker = self.read_u8()?;
        self.list_size_after_marker(marker)
    }

    pub(crate) fn list_size_after_marker(&mut self, marker: u8) -> Result<usize> {
        match marker {
            m if m & 0xF0 == TINY_LIST => Ok((m & 0x0F) as usize),
            LIST_8 => self.read_size(1),
            LIST_16 => self.read_size(2),
            LIST_32 => self.read_size(4),
            other => Err(unexpected("List", other)),
        }
    }

    pub fn unpack_map_header(&mut self) -> Result<usize> {
        let marker = self.read_u8()?;
        self.map_size_after_marker(marker)
    }

    pub(crate) fn map_size_after_marker(&mut self, marker: u8) -> Result<usize> {
        match marker {
            m if m & 0xF0 == TINY_MAP => Ok((m & 0x0F) as usize),
            MAP_8 => self.read_size(1),
            MAP_16 => self.read_size(2),
            MAP_32 => self.read_size(4),
            other => Err(unexpected("Map", other)),
        }
    }
}

fn unexpected(expected: &str, marker: u8) -> BoltError {
    BoltError::Protocol(format!(
        "Expected {} but got marker 0x{:02X}",
        expected, marker
    ))
}
