//! Value Codec Tests
//!
//! Tests for base value encoding and the versioned structure layers.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use boltlink::packstream::layers::{self, StructDecoder, StructLayer};
use boltlink::packstream::{
    Date, DateTime, Duration, LocalDateTime, LocalTime, Packer, Point, Time, Unpacker, Value,
    ValueCodec, Zone, MAX_NESTING_DEPTH,
};
use boltlink::{BoltError, Result};

fn encode(codec: &ValueCodec, value: &Value) -> Bytes {
    let mut out = BytesMut::new();
    codec.encode(value, &mut out).unwrap();
    out.freeze()
}

fn round_trip(codec: &ValueCodec, value: Value) {
    let decoded = codec.decode(encode(codec, &value)).unwrap();
    assert_eq!(decoded, value);
}

fn v1() -> ValueCodec {
    ValueCodec::for_version(1).unwrap()
}

fn v2() -> ValueCodec {
    ValueCodec::for_version(2).unwrap()
}

// =============================================================================
// Base Value Tests
// =============================================================================

#[test]
fn test_integer_markers_use_smallest_encoding() {
    let codec = v1();
    assert_eq!(&encode(&codec, &Value::Integer(1))[..], &[0x01]);
    assert_eq!(&encode(&codec, &Value::Integer(-16))[..], &[0xF0]);
    assert_eq!(&encode(&codec, &Value::Integer(-17))[..], &[0xC8, 0xEF]);
    assert_eq!(&encode(&codec, &Value::Integer(128))[..], &[0xC9, 0x00, 0x80]);
    assert_eq!(&encode(&codec, &Value::Integer(40_000))[..], &[0xCA, 0x00, 0x00, 0x9C, 0x40]);
    assert_eq!(encode(&codec, &Value::Integer(i64::MAX)).len(), 9);
}

#[test]
fn test_integer_boundaries_round_trip() {
    let codec = v1();
    for i in [
        0, 127, 128, -16, -17, -128, -129, 32_767, 32_768, -32_768, -32_769,
        i32::MAX as i64, i32::MIN as i64, i64::MAX, i64::MIN,
    ] {
        round_trip(&codec, Value::Integer(i));
    }
}

#[test]
fn test_scalars_and_collections_round_trip() {
    let codec = v1();
    round_trip(&codec, Value::Null);
    round_trip(&codec, Value::Boolean(true));
    round_trip(&codec, Value::Boolean(false));
    round_trip(&codec, Value::Float(-1.5));
    round_trip(&codec, Value::Bytes(vec![1, 2, 3]));
    round_trip(&codec, Value::String("é and ü".to_string()));
    round_trip(&codec, Value::String("x".repeat(300)));
    round_trip(&codec, Value::List((0..20).map(Value::Integer).collect()));

    let mut map = BTreeMap::new();
    map.insert("name".to_string(), Value::from("Ada"));
    map.insert("tags".to_string(), Value::List(vec![Value::from("a"), Value::Null]));
    round_trip(&codec, Value::Map(map));
}

#[test]
fn test_trailing_bytes_are_rejected() {
    let err = v1().decode(Bytes::from_static(&[0x01, 0x02])).unwrap_err();
    assert!(matches!(err, BoltError::Protocol(_)));
}

#[test]
fn test_truncated_value_is_rejected() {
    let err = v1().decode(Bytes::from_static(&[0xC9, 0x00])).unwrap_err();
    assert!(matches!(err, BoltError::Protocol(_)));
}

// =============================================================================
// Version 1 Structure Tests
// =============================================================================

#[test]
fn test_v1_decodes_node_as_opaque_structure() {
    let mut out = BytesMut::new();
    let mut packer = Packer::new(&mut out);
    packer.pack_struct_header(3, layers::NODE).unwrap();
    packer.pack_int(42);
    packer.pack_list_header(1).unwrap();
    packer.pack_string("Person").unwrap();
    packer.pack_map_header(0).unwrap();

    let value = v1().decode(out.freeze()).unwrap();
    assert_eq!(
        value,
        Value::Structure {
            tag: layers::NODE,
            fields: vec![
                Value::Integer(42),
                Value::List(vec![Value::from("Person")]),
                Value::Map(BTreeMap::new()),
            ],
        }
    );
}

#[test]
fn test_v1_rejects_temporal_parameters() {
    let mut out = BytesMut::new();
    let err = v1()
        .encode(&Value::Date(Date { epoch_day: 1 }), &mut out)
        .unwrap_err();
    match err {
        BoltError::Client(message) => {
            assert!(message.contains("Date"));
            assert!(message.contains("protocol version 1"));
        }
        other => panic!("Expected client error, got {:?}", other),
    }
}

#[test]
fn test_v1_does_not_know_v2_tags() {
    let codec = v1();
    let bytes = encode(&v2(), &Value::Date(Date { epoch_day: 0 }));
    let err = codec.decode(bytes).unwrap_err();
    match err {
        BoltError::Protocol(message) => {
            assert!(message.contains("0x44"));
            assert!(message.contains("1 fields"));
        }
        other => panic!("Expected protocol error, got {:?}", other),
    }
}

// =============================================================================
// Version 2 Structure Tests
// =============================================================================

#[test]
fn test_temporal_values_round_trip_at_boundaries() {
    let codec = v2();
    for epoch_day in [0, -1, i64::MIN, i64::MAX, 18_000] {
        round_trip(&codec, Value::Date(Date { epoch_day }));
    }
    for offset_seconds in [0, -64_800, 64_800] {
        round_trip(&codec, Value::Time(Time { nano_of_day_local: 86_399_999_999_999, offset_seconds }));
    }
    round_trip(&codec, Value::LocalTime(LocalTime { nano_of_day: 0 }));
    round_trip(&codec, Value::LocalDateTime(LocalDateTime { epoch_second: i64::MIN, nano: 999_999_999 }));
    round_trip(
        &codec,
        Value::DateTime(DateTime { epoch_second_local: -1, nano: 1, zone: Zone::Offset(3600) }),
    );
    round_trip(
        &codec,
        Value::DateTime(DateTime {
            epoch_second_local: 1_500_000_000,
            nano: 0,
            zone: Zone::Id("Europe/Stockholm".to_string()),
        }),
    );
}

#[test]
fn test_date_time_offset_and_zone_use_distinct_tags() {
    let codec = v2();
    let offset = encode(&codec, &Value::DateTime(DateTime { epoch_second_local: 0, nano: 0, zone: Zone::Offset(0) }));
    let zone = encode(&codec, &Value::DateTime(DateTime { epoch_second_local: 0, nano: 0, zone: Zone::Id("UTC".to_string()) }));
    assert_eq!(&offset[..2], &[0xB3, layers::DATE_TIME_WITH_OFFSET]);
    assert_eq!(&zone[..2], &[0xB3, layers::DATE_TIME_WITH_ZONE_ID]);
}

#[test]
fn test_duration_is_not_normalized() {
    let codec = v2();
    let duration = Duration { months: 0, days: 400, seconds: 90_000, nanos: 1_500_000_000 };
    let bytes = encode(&codec, &Value::Duration(duration));
    assert_eq!(codec.decode(bytes).unwrap(), Value::Duration(duration));

    round_trip(&codec, Value::Duration(Duration { months: i64::MAX, days: i64::MIN, seconds: -1, nanos: i32::MIN }));
}

#[test]
fn test_points_round_trip() {
    let codec = v2();
    round_trip(&codec, Value::Point(Point::new_2d(7203, 1.0, -2.5)));
    round_trip(&codec, Value::Point(Point::new_3d(4979, f64::MAX, f64::MIN, 0.0)));

    let bytes = encode(&codec, &Value::Point(Point::new_2d(7203, 0.0, 0.0)));
    assert_eq!(&bytes[..2], &[0xB3, layers::POINT_2D]);
    let bytes = encode(&codec, &Value::Point(Point::new_3d(9157, 0.0, 0.0, 1.0)));
    assert_eq!(&bytes[..2], &[0xB4, layers::POINT_3D]);
}

#[test]
fn test_point_3d_with_nan_z_keeps_its_dimension() {
    let codec = v2();
    let mut wire = vec![0xB4, layers::POINT_3D, 0x01, 0xC1];
    wire.extend_from_slice(&1.0f64.to_be_bytes());
    wire.push(0xC1);
    wire.extend_from_slice(&2.0f64.to_be_bytes());
    wire.push(0xC1);
    wire.extend_from_slice(&f64::NAN.to_be_bytes());

    let decoded = codec.decode(Bytes::from(wire)).unwrap();
    match &decoded {
        Value::Point(point) => {
            assert!(point.is_3d());
            assert!(point.z.map_or(false, f64::is_nan));
        }
        other => panic!("Expected point, got {:?}", other),
    }

    let bytes = encode(&codec, &decoded);
    assert_eq!(&bytes[..2], &[0xB4, layers::POINT_3D]);
    assert_eq!(codec.decode(bytes).unwrap(), decoded);
    assert_ne!(decoded, Value::Point(Point::new_2d(1, 1.0, 2.0)));
}

#[test]
fn test_nesting_depth_is_capped() {
    let codec = v1();

    let mut within = vec![0x91; MAX_NESTING_DEPTH - 1];
    within.push(0x01);
    assert!(codec.decode(Bytes::from(within)).is_ok());

    let mut hostile = vec![0x91; 100_000];
    hostile.push(0x01);
    match codec.decode(Bytes::from(hostile)).unwrap_err() {
        BoltError::Protocol(message) => assert!(message.contains("nesting")),
        other => panic!("Expected protocol error, got {:?}", other),
    }
}

#[test]
fn test_arity_mismatch_is_protocol_error() {
    // Date declared with two fields
    let bytes = Bytes::from_static(&[0xB2, 0x44, 0x01, 0x02]);
    match v2().decode(bytes).unwrap_err() {
        BoltError::Protocol(message) => {
            assert!(message.contains("Date"));
            assert!(message.contains("should have 1 fields, received 2 fields"));
        }
        other => panic!("Expected protocol error, got {:?}", other),
    }
}

#[test]
fn test_unknown_tag_names_tag_and_size() {
    let bytes = Bytes::from_static(&[0xB1, 0x7A, 0x01]);
    match v2().decode(bytes).unwrap_err() {
        BoltError::Protocol(message) => {
            assert!(message.contains("0x7A"));
            assert!(message.contains("1 fields"));
        }
        other => panic!("Expected protocol error, got {:?}", other),
    }
}

#[test]
fn test_temporal_values_nested_in_collections() {
    let codec = v2();
    let mut map = BTreeMap::new();
    map.insert("when".to_string(), Value::Date(Date { epoch_day: 3 }));
    map.insert("where".to_string(), Value::List(vec![Value::Point(Point::new_2d(1, 2.0, 3.0))]));
    round_trip(&codec, Value::Map(map));
}

// =============================================================================
// Layer Composition Tests
// =============================================================================

fn decode_nothing(_codec: &ValueCodec, _unpacker: &mut Unpacker) -> Result<Value> {
    Ok(Value::Null)
}

fn encode_nothing(_codec: &ValueCodec, _value: &Value, _packer: &mut Packer<'_>) -> Option<Result<()>> {
    None
}

static REDEFINES_DATE: StructLayer = StructLayer {
    version: 3,
    decoders: &[StructDecoder { tag: layers::DATE, name: "OtherDate", arity: 1, decode: decode_nothing }],
    encode: encode_nothing,
};

#[test]
fn test_layer_redefining_tag_is_rejected() {
    let err = ValueCodec::with_layers(vec![&layers::V1, &layers::V2, &REDEFINES_DATE]).unwrap_err();
    assert!(matches!(err, BoltError::Config(_)));
}

#[test]
fn test_layers_out_of_order_are_rejected() {
    let err = ValueCodec::with_layers(vec![&layers::V2, &layers::V1]).unwrap_err();
    assert!(matches!(err, BoltError::Config(_)));
}

#[test]
fn test_unsupported_versions() {
    assert!(ValueCodec::for_version(0).is_err());
    assert!(ValueCodec::for_version(3).is_err());
    assert_eq!(v2().version(), 2);
}
