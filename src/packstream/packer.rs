//! Packer
//!
//! Writes PackStream markers and primitive values into a buffer.

use bytes::{BufMut, BytesMut};

use crate::error::{BoltError, Result};
use super::marker::*;

/// Appends encoded values to an output buffer
pub struct Packer<'a> {
    out: &'a mut BytesMut,
}

impl<'a> Packer<'a> {
    pub fn new(out: &'a mut BytesMut) -> Self {
        Self { out }
    }

    pub fn pack_null(&mut self) {
        self.out.put_u8(NULL);
    }

    pub fn pack_bool(&mut self, value: bool) {
        self.out.put_u8(if value { TRUE } else { FALSE });
    }

    /// Smallest representation that holds `value`
    pub fn pack_int(&mut self, value: i64) {
        if (TINY_INT_MIN..=TINY_INT_MAX).contains(&value) {
            self.out.put_i8(value as i8);
        } else if (i8::MIN as i64..=i8::MAX as i64).contains(&value) {
            self.out.put_u8(INT_8);
            self.out.put_i8(value as i8);
        } else if (i16::MIN as i64..=i16::MAX as i64).contains(&value) {
            self.out.put_u8(INT_16);
            self.out.put_i16(value as i16);
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
            self.out.put_u8(INT_32);
            self.out.put_i32(value as i32);
        } else {
            self.out.put_u8(INT_64);
            self.out.put_i64(value);
        }
    }

    pub fn pack_float(&mut self, value: f64) {
        self.out.put_u8(FLOAT_64);
        self.out.put_f64(value);
    }

    pub fn pack_bytes(&mut self, value: &[u8]) -> Result<()> {
        let len = value.len();
        if len <= u8::MAX as usize {
            self.out.put_u8(BYTES_8);
            self.out.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            self.out.put_u8(BYTES_16);
            self.out.put_u16(len as u16);
        } else if len <= u32::MAX as usize {
            self.out.put_u8(BYTES_32);
            self.out.put_u32(len as u32);
        } else {
            return Err(too_large("Bytes", len));
        }
        self.out.put_slice(value);
        Ok(())
    }

    pub fn pack_string(&mut self, value: &str) -> Result<()> {
        self.pack_header(value.len(), TINY_STRING, [STRING_8, STRING_16, STRING_32], "String")?;
        self.out.put_slice(value.as_bytes());
        Ok(())
    }

    pub fn pack_list_header(&mut self, size: usize) -> Result<()> {
        self.pack_header(size, TINY_LIST, [LIST_8, LIST_16, LIST_32], "List")
    }

    pub fn pack_map_header(&mut self, size: usize) -> Result<()> {
        self.pack_header(size, TINY_MAP, [MAP_8, MAP_16, MAP_32], "Map")
    }

    pub fn pack_struct_header(&mut self, size: usize, tag: u8) -> Result<()> {
        if size < TINY_SIZE_LIMIT {
            self.out.put_u8(TINY_STRUCT | size as u8);
        } else if size <= u8::MAX as usize {
            self.out.put_u8(STRUCT_8);
            self.out.put_u8(size as u8);
        } else if size <= u16::MAX as usize {
            self.out.put_u8(STRUCT_16);
            self.out.put_u16(size as u16);
        } else {
            return Err(too_large("Structure", size));
        }
        self.out.put_u8(tag);
        Ok(())
    }

    fn pack_header(&mut self, size: usize, tiny: u8, sized: [u8; 3], what: &str) -> Result<()> {
        if size < TINY_SIZE_LIMIT {
            self.out.put_u8(tiny | size as u8);
        } else if size <= u8::MAX as usize {
            self.out.put_u8(sized[0]);
            self.out.put_u8(size as u8);
        } else if size <= u16::MAX as usize {
            self.out.put_u8(sized[1]);
            self.out.put_u16(size as u16);
        } else if size <= u32::MAX as usize {
            self.out.put_u8(sized[2]);
            self.out.put_u32(size as u32);
        } else {
            return Err(too_large(what, size));
        }
        Ok(())
    }
}

fn too_large(what: &str, size: usize) -> BoltError {
    BoltError::Client(format!("{} of size {} is too large to encode", what, size))
}
