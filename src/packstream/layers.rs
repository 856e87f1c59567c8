//! Versioned structure layers
//!
//! Each protocol version contributes a table of structure tags. A codec
//! consults its tables in version order; a later version only ever adds tags.
//!
//! | Version | Tag  | Structure             | Fields                                   |
//! |---------|------|-----------------------|------------------------------------------|
//! | 1       | 0x4E | Node                  | id, labels, properties                   |
//! | 1       | 0x52 | Relationship          | id, start, end, type, properties         |
//! | 1       | 0x72 | UnboundRelationship   | id, type, properties                     |
//! | 1       | 0x50 | Path                  | nodes, relationships, sequence           |
//! | 2       | 0x44 | Date                  | epoch_day                                |
//! | 2       | 0x54 | Time                  | nano_of_day_local, offset_seconds        |
//! | 2       | 0x74 | LocalTime             | nano_of_day                              |
//! | 2       | 0x64 | LocalDateTime         | epoch_second, nano                       |
//! | 2       | 0x46 | DateTimeWithOffset    | epoch_second_local, nano, offset_seconds |
//! | 2       | 0x66 | DateTimeWithZoneId    | epoch_second_local, nano, zone_id        |
//! | 2       | 0x45 | Duration              | months, days, seconds, nanos             |
//! | 2       | 0x58 | Point2D               | srid, x, y                               |
//! | 2       | 0x59 | Point3D               | srid, x, y, z                            |

use crate::error::Result;
use super::packer::Packer;
use super::unpacker::Unpacker;
use super::value::{Date, DateTime, Duration, LocalDateTime, LocalTime, Point, Time, Value, Zone};
use super::ValueCodec;

pub const NODE: u8 = 0x4E;
pub const RELATIONSHIP: u8 = 0x52;
pub const UNBOUND_RELATIONSHIP: u8 = 0x72;
pub const PATH: u8 = 0x50;

pub const DATE: u8 = 0x44;
pub const TIME: u8 = 0x54;
pub const LOCAL_TIME: u8 = 0x74;
pub const LOCAL_DATE_TIME: u8 = 0x64;
pub const DATE_TIME_WITH_OFFSET: u8 = 0x46;
pub const DATE_TIME_WITH_ZONE_ID: u8 = 0x66;
pub const DURATION: u8 = 0x45;
pub const POINT_2D: u8 = 0x58;
pub const POINT_3D: u8 = 0x59;

type DecodeFn = fn(&ValueCodec, &mut Unpacker) -> Result<Value>;
type EncodeFn = fn(&ValueCodec, &Value, &mut Packer<'_>) -> Option<Result<()>>;

/// One structure a layer knows how to decode
pub struct StructDecoder {
    pub tag: u8,
    pub name: &'static str,
    pub arity: usize,
    pub decode: DecodeFn,
}

/// The structures introduced by one protocol version
pub struct StructLayer {
    pub version: u32,
    pub decoders: &'static [StructDecoder],

    /// Returns `None` when the value is not one of this layer's types
    pub encode: EncodeFn,
}

impl StructLayer {
    pub fn decoder(&self, tag: u8) -> Option<&StructDecoder> {
        self.decoders.iter().find(|d| d.tag == tag)
    }
}

// =============================================================================
// Version 1: graph structures, passed through uninterpreted
// =============================================================================

pub static V1: StructLayer = StructLayer {
    version: 1,
    decoders: &[
        StructDecoder { tag: NODE, name: "Node", arity: 3, decode: decode_node },
        StructDecoder { tag: RELATIONSHIP, name: "Relationship", arity: 5, decode: decode_relationship },
        StructDecoder {
            tag: UNBOUND_RELATIONSHIP,
            name: "UnboundRelationship",
            arity: 3,
            decode: decode_unbound_relationship,
        },
        StructDecoder { tag: PATH, name: "Path", arity: 3, decode: decode_path },
    ],
    encode: encode_v1,
};

fn decode_fields(codec: &ValueCodec, unpacker: &mut Unpacker, tag: u8, arity: usize) -> Result<Value> {
    let fields = (0..arity)
        .map(|_| codec.unpack(unpacker))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Structure { tag, fields })
}

fn decode_node(codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    decode_fields(codec, unpacker, NODE, 3)
}

fn decode_relationship(codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    decode_fields(codec, unpacker, RELATIONSHIP, 5)
}

fn decode_unbound_relationship(codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    decode_fields(codec, unpacker, UNBOUND_RELATIONSHIP, 3)
}

fn decode_path(codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    decode_fields(codec, unpacker, PATH, 3)
}

// Graph entities are never sent as parameters
fn encode_v1(_codec: &ValueCodec, _value: &Value, _packer: &mut Packer<'_>) -> Option<Result<()>> {
    None
}

// =============================================================================
// Version 2: temporal and spatial types
// =============================================================================

pub static V2: StructLayer = StructLayer {
    version: 2,
    decoders: &[
        StructDecoder { tag: DATE, name: "Date", arity: 1, decode: decode_date },
        StructDecoder { tag: TIME, name: "Time", arity: 2, decode: decode_time },
        StructDecoder { tag: LOCAL_TIME, name: "LocalTime", arity: 1, decode: decode_local_time },
        StructDecoder {
            tag: LOCAL_DATE_TIME,
            name: "LocalDateTime",
            arity: 2,
            decode: decode_local_date_time,
        },
        StructDecoder {
            tag: DATE_TIME_WITH_OFFSET,
            name: "DateTimeWithOffset",
            arity: 3,
            decode: decode_date_time_with_offset,
        },
        StructDecoder {
            tag: DATE_TIME_WITH_ZONE_ID,
            name: "DateTimeWithZoneId",
            arity: 3,
            decode: decode_date_time_with_zone_id,
        },
        StructDecoder { tag: DURATION, name: "Duration", arity: 4, decode: decode_duration },
        StructDecoder { tag: POINT_2D, name: "Point2D", arity: 3, decode: decode_point_2d },
        StructDecoder { tag: POINT_3D, name: "Point3D", arity: 4, decode: decode_point_3d },
    ],
    encode: encode_v2,
};

fn encode_v2(_codec: &ValueCodec, value: &Value, packer: &mut Packer<'_>) -> Option<Result<()>> {
    let result = match value {
        Value::Date(date) => pack_date(date, packer),
        Value::Time(time) => pack_time(time, packer),
        Value::LocalTime(time) => pack_local_time(time, packer),
        Value::LocalDateTime(dt) => pack_local_date_time(dt, packer),
        Value::DateTime(dt) => pack_date_time(dt, packer),
        Value::Duration(duration) => pack_duration(duration, packer),
        Value::Point(point) => pack_point(point, packer),
        _ => return None,
    };
    Some(result)
}

fn pack_date(date: &Date, packer: &mut Packer<'_>) -> Result<()> {
    packer.pack_struct_header(1, DATE)?;
    packer.pack_int(date.epoch_day);
    Ok(())
}

fn pack_time(time: &Time, packer: &mut Packer<'_>) -> Result<()> {
    packer.pack_struct_header(2, TIME)?;
    packer.pack_int(time.nano_of_day_local);
    packer.pack_int(time.offset_seconds as i64);
    Ok(())
}

fn pack_local_time(time: &LocalTime, packer: &mut Packer<'_>) -> Result<()> {
    packer.pack_struct_header(1, LOCAL_TIME)?;
    packer.pack_int(time.nano_of_day);
    Ok(())
}

fn pack_local_date_time(dt: &LocalDateTime, packer: &mut Packer<'_>) -> Result<()> {
    packer.pack_struct_header(2, LOCAL_DATE_TIME)?;
    packer.pack_int(dt.epoch_second);
    packer.pack_int(dt.nano as i64);
    Ok(())
}

fn pack_date_time(dt: &DateTime, packer: &mut Packer<'_>) -> Result<()> {
    match &dt.zone {
        Zone::Offset(offset) => {
            packer.pack_struct_header(3, DATE_TIME_WITH_OFFSET)?;
            packer.pack_int(dt.epoch_second_local);
            packer.pack_int(dt.nano as i64);
            packer.pack_int(*offset as i64);
        }
        Zone::Id(zone_id) => {
            packer.pack_struct_header(3, DATE_TIME_WITH_ZONE_ID)?;
            packer.pack_int(dt.epoch_second_local);
            packer.pack_int(dt.nano as i64);
            packer.pack_string(zone_id)?;
        }
    }
    Ok(())
}

fn pack_duration(duration: &Duration, packer: &mut Packer<'_>) -> Result<()> {
    packer.pack_struct_header(4, DURATION)?;
    packer.pack_int(duration.months);
    packer.pack_int(duration.days);
    packer.pack_int(duration.seconds);
    packer.pack_int(duration.nanos as i64);
    Ok(())
}

fn pack_point(point: &Point, packer: &mut Packer<'_>) -> Result<()> {
    match point.z {
        Some(_) => packer.pack_struct_header(4, POINT_3D)?,
        None => packer.pack_struct_header(3, POINT_2D)?,
    }
    packer.pack_int(point.srid as i64);
    packer.pack_float(point.x);
    packer.pack_float(point.y);
    if let Some(z) = point.z {
        packer.pack_float(z);
    }
    Ok(())
}

fn decode_date(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let epoch_day = unpacker.unpack_int()?;
    Ok(Value::Date(Date { epoch_day }))
}

fn decode_time(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let nano_of_day_local = unpacker.unpack_int()?;
    let offset_seconds = unpacker.unpack_i32("Time offset")?;
    Ok(Value::Time(Time { nano_of_day_local, offset_seconds }))
}

fn decode_local_time(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let nano_of_day = unpacker.unpack_int()?;
    Ok(Value::LocalTime(LocalTime { nano_of_day }))
}

fn decode_local_date_time(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let epoch_second = unpacker.unpack_int()?;
    let nano = unpacker.unpack_i32("LocalDateTime nano")?;
    Ok(Value::LocalDateTime(LocalDateTime { epoch_second, nano }))
}

fn decode_date_time_with_offset(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let epoch_second_local = unpacker.unpack_int()?;
    let nano = unpacker.unpack_i32("DateTime nano")?;
    let offset = unpacker.unpack_i32("DateTime offset")?;
    Ok(Value::DateTime(DateTime {
        epoch_second_local,
        nano,
        zone: Zone::Offset(offset),
    }))
}

fn decode_date_time_with_zone_id(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let epoch_second_local = unpacker.unpack_int()?;
    let nano = unpacker.unpack_i32("DateTime nano")?;
    let zone_id = unpacker.unpack_string()?;
    Ok(Value::DateTime(DateTime {
        epoch_second_local,
        nano,
        zone: Zone::Id(zone_id),
    }))
}

fn decode_duration(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let months = unpacker.unpack_int()?;
    let days = unpacker.unpack_int()?;
    let seconds = unpacker.unpack_int()?;
    let nanos = unpacker.unpack_i32("Duration nanos")?;
    Ok(Value::Duration(Duration { months, days, seconds, nanos }))
}

fn decode_point_2d(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let srid = unpacker.unpack_i32("Point srid")?;
    let x = unpacker.unpack_float()?;
    let y = unpacker.unpack_float()?;
    Ok(Value::Point(Point::new_2d(srid, x, y)))
}

fn decode_point_3d(_codec: &ValueCodec, unpacker: &mut Unpacker) -> Result<Value> {
    let srid = unpacker.unpack_i32("Point srid")?;
    let x = unpacker.unpack_float()?;
    let y = unpacker.unpack_float()?;
    let z = unpacker.unpack_float()?;
    Ok(Value::Point(Point::new_3d(srid, x, y, z)))
}
