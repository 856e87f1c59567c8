//! PackStream Module
//!
//! Structured value codec shared by the message codec.
//!
//! ## Value Format
//! ```text
//! ┌────────────┬───────────────────────────────┐
//! │ Marker (1) │ Size / payload (0..n)         │
//! └────────────┴───────────────────────────────┘
//!
//! Structure:
//! ┌────────────────────┬─────────┬──────────────────────┐
//! │ 0xB0|N or 0xDC/DD  │ Tag (1) │ N fields (recursive) │
//! └────────────────────┴─────────┴──────────────────────┘
//! ```
//!
//! Base types are version independent. Structures are resolved through an
//! ordered list of [`StructLayer`] tables, one per protocol version.

mod value;
mod packer;
mod unpacker;
pub mod layers;

use std::collections::HashSet;

use bytes::{Bytes, BytesMut};

use crate::error::{BoltError, Result};

pub use layers::{StructDecoder, StructLayer};
pub use packer::Packer;
pub use unpacker::{Unpacker, MAX_NESTING_DEPTH};
pub use value::{Date, DateTime, Duration, LocalDateTime, LocalTime, Point, Time, Value, Zone};

/// Marker bytes
pub(crate) mod marker {
    pub const TINY_SIZE_LIMIT: usize = 16;
    pub const TINY_INT_MIN: i64 = -16;
    pub const TINY_INT_MAX: i64 = 127;

    pub const TINY_STRING: u8 = 0x80;
    pub const TINY_LIST: u8 = 0x90;
    pub const TINY_MAP: u8 = 0xA0;
    pub const TINY_STRUCT: u8 = 0xB0;

    pub const NULL: u8 = 0xC0;
    pub const FLOAT_64: u8 = 0xC1;
    pub const FALSE: u8 = 0xC2;
    pub const TRUE: u8 = 0xC3;

    pub const INT_8: u8 = 0xC8;
    pub const INT_16: u8 = 0xC9;
    pub const INT_32: u8 = 0xCA;
    pub const INT_64: u8 = 0xCB;

    pub const BYTES_8: u8 = 0xCC;
    pub const BYTES_16: u8 = 0xCD;
    pub const BYTES_32: u8 = 0xCE;

    pub const STRING_8: u8 = 0xD0;
    pub const STRING_16: u8 = 0xD1;
    pub const STRING_32: u8 = 0xD2;

    pub const LIST_8: u8 = 0xD4;
    pub const LIST_16: u8 = 0xD5;
    pub const LIST_32: u8 = 0xD6;

    pub const MAP_8: u8 = 0xD8;
    pub const MAP_16: u8 = 0xD9;
    pub const MAP_32: u8 = 0xDA;

    pub const STRUCT_8: u8 = 0xDC;
    pub const STRUCT_16: u8 = 0xDD;
}

use marker::*;

/// Highest protocol version with a structure layer
pub const LATEST_VERSION: u32 = 2;

/// Value codec for one negotiated protocol version
#[derive(Clone)]
pub struct ValueCodec {
    version: u32,

    /// Consulted in version order
    layers: Vec<&'static StructLayer>,
}

impl ValueCodec {
    /// Codec with every layer up to and including `version`
    pub fn for_version(version: u32) -> Result<Self> {
        if version == 0 || version > LATEST_VERSION {
            return Err(BoltError::Client(format!(
                "Protocol version {} has no value codec",
                version
            )));
        }
        let layers = [&layers::V1, &layers::V2]
            .into_iter()
            .filter(|layer| layer.version <= version)
            .collect();
        Self::with_layers(layers)
    }

    /// Codec over an explicit layer list.
    ///
    /// Layers must be in ascending version order and may not redefine a tag
    /// owned by an earlier layer.
    pub fn with_layers(layers: Vec<&'static StructLayer>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut last_version = 0;
        for layer in &layers {
            if layer.version <= last_version {
                return Err(BoltError::Config(format!(
                    "Structure layer for version {} is out of order",
                    layer.version
                )));
            }
            last_version = layer.version;
            for decoder in layer.decoders {
                if !seen.insert(decoder.tag) {
                    return Err(BoltError::Config(format!(
                        "Structure layer for version {} redefines tag 0x{:02X} ({})",
                        layer.version, decoder.tag, decoder.name
                    )));
                }
            }
        }
        Ok(Self {
            version: last_version,
            layers,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Append the encoding of `value` to `out`
    pub fn encode(&self, value: &Value, out: &mut BytesMut) -> Result<()> {
        let mut packer = Packer::new(out);
        self.pack(value, &mut packer)
    }

    pub fn pack(&self, value: &Value, packer: &mut Packer<'_>) -> Result<()> {
        match value {
            Value::Null => packer.pack_null(),
            Value::Boolean(b) => packer.pack_bool(*b),
            Value::Integer(i) => packer.pack_int(*i),
            Value::Float(f) => packer.pack_float(*f),
            Value::Bytes(bytes) => packer.pack_bytes(bytes)?,
            Value::String(s) => packer.pack_string(s)?,
            Value::List(items) => {
                packer.pack_list_header(items.len())?;
                for item in items {
                    self.pack(item, packer)?;
                }
            }
            Value::Map(map) => {
                packer.pack_map_header(map.len())?;
                for (key, item) in map {
                    packer.pack_string(key)?;
                    self.pack(item, packer)?;
                }
            }
            other => return self.pack_struct_value(other, packer),
        }
        Ok(())
    }

    fn pack_struct_value(&self, value: &Value, packer: &mut Packer<'_>) -> Result<()> {
        for layer in &self.layers {
            if let Some(result) = (layer.encode)(self, value, packer) {
                return result;
            }
        }
        Err(BoltError::Client(format!(
            "{} is not supported as a parameter in protocol version {}",
            value.type_name(),
            self.version
        )))
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Decode exactly one value from `buf`
    pub fn decode(&self, buf: Bytes) -> Result<Value> {
        let mut unpacker = Unpacker::new(buf);
        let value = self.unpack(&mut unpacker)?;
        if unpacker.has_remaining() {
            return Err(BoltError::Protocol(format!(
                "{} trailing bytes after value",
                unpacker.remaining()
            )));
        }
        Ok(value)
    }

    /// Decode the next value, failing on nesting beyond [`MAX_NESTING_DEPTH`]
    pub fn unpack(&self, unpacker: &mut Unpacker) -> Result<Value> {
        unpacker.descend()?;
        let value = self.unpack_value(unpacker);
        unpacker.ascend();
        value
    }

    fn unpack_value(&self, unpacker: &mut Unpacker) -> Result<Value> {
        let marker = unpacker.peek_marker()?;
        let high = marker & 0xF0;

        if high == TINY_STRUCT || marker == STRUCT_8 || marker == STRUCT_16 {
            let (size, tag) = unpacker.unpack_struct_header()?;
            return self.decode_struct(tag, size, unpacker);
        }

        let marker = unpacker.read_u8()?;
        match marker {
            NULL => Ok(Value::Null),
            TRUE => Ok(Value::Boolean(true)),
            FALSE => Ok(Value::Boolean(false)),
            FLOAT_64 => Ok(Value::Float(unpacker.float_after_marker()?)),
            BYTES_8 | BYTES_16 | BYTES_32 => Ok(Value::Bytes(unpacker.bytes_after_marker(marker)?)),
            m if m & 0xF0 == TINY_STRING || matches!(m, STRING_8 | STRING_16 | STRING_32) => {
                Ok(Value::String(unpacker.string_after_marker(m)?))
            }
            m if m & 0xF0 == TINY_LIST || matches!(m, LIST_8 | LIST_16 | LIST_32) => {
                let size = unpacker.list_size_after_marker(m)?;
                let items = (0..size)
                    .map(|_| self.unpack(unpacker))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(items))
            }
            m if m & 0xF0 == TINY_MAP || matches!(m, MAP_8 | MAP_16 | MAP_32) => {
                let size = unpacker.map_size_after_marker(m)?;
                let mut map = std::collections::BTreeMap::new();
                for _ in 0..size {
                    let key = unpacker.unpack_string()?;
                    let item = self.unpack(unpacker)?;
                    map.insert(key, item);
                }
                Ok(Value::Map(map))
            }
            m => Ok(Value::Integer(unpacker.int_after_marker(m)?)),
        }
    }

    /// Decode the fields of a structure whose header declared `size` fields.
    ///
    /// The declared size must match the arity of the tag before any field is
    /// read.
    pub fn decode_struct(&self, tag: u8, size: usize, unpacker: &mut Unpacker) -> Result<Value> {
        let decoder = self
            .layers
            .iter()
            .find_map(|layer| layer.decoder(tag))
            .ok_or_else(|| {
                BoltError::Protocol(format!(
                    "Unknown struct tag 0x{:02X} with {} fields",
                    tag, size
                ))
            })?;

        if size != decoder.arity {
            return Err(BoltError::Protocol(format!(
                "Invalid message received, serialized {} structures should have {} fields, received {} fields",
                decoder.name, decoder.arity, size
            )));
        }
        (decoder.decode)(self, unpacker)
    }
}

impl std::fmt::Debug for ValueCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCodec")
            .field("version", &self.version)
            .field("layers", &self.layers.len())
            .finish()
    }
}
