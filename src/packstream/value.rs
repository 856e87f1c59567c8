//! Value definitions
//!
//! Values carried in message fields, including the temporal and spatial
//! structures added by protocol version 2. Temporal values are kept in
//! their wire representation; calendar arithmetic belongs to the caller.

use std::collections::BTreeMap;

/// A decoded or to-be-encoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),

    /// A structure this crate does not interpret (graph entities)
    Structure { tag: u8, fields: Vec<Value> },

    Date(Date),
    Time(Time),
    LocalTime(LocalTime),
    LocalDateTime(LocalDateTime),
    DateTime(DateTime),
    Duration(Duration),
    Point(Point),
}

/// Days since 1970-01-01
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub epoch_day: i64,
}

/// Time of day with a UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    /// Nanoseconds since local midnight
    pub nano_of_day_local: i64,
    pub offset_seconds: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub nano_of_day: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDateTime {
    /// Seconds since the epoch, read as local wall-clock time
    pub epoch_second: i64,
    pub nano: i32,
}

/// Date-time with either a fixed offset or a named zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTime {
    /// Seconds since the epoch, read as local wall-clock time
    pub epoch_second_local: i64,
    pub nano: i32,
    pub zone: Zone,
}

/// The two date-time wire shapes; each has its own struct tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zone {
    Offset(i32),
    Id(String),
}

/// Four independent components; months and days are never folded into seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i32,
}

/// A 2D or 3D point; 2D points have a NaN `z`
#[derive(Debug, Clone, Copy)]
pub struct Point {
    pub srid: i32,
    pub x: f64,
    pub y: f64,

    /// `Some` for a 3D point, whatever its value
    pub z: Option<f64>,
}

impl Point {
    pub fn new_2d(srid: i32, x: f64, y: f64) -> Self {
        Self { srid, x, y, z: None }
    }

    pub fn new_3d(srid: i32, x: f64, y: f64, z: f64) -> Self {
        Self { srid, x, y, z: Some(z) }
    }

    pub fn is_3d(&self) -> bool {
        self.z.is_some()
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: f64, b: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a == b
        }
        let same_z = match (self.z, other.z) {
            (Some(a), Some(b)) => same(a, b),
            (None, None) => true,
            _ => false,
        };
        self.srid == other.srid && same(self.x, other.x) && same(self.y, other.y) && same_z
    }
}

impl Value {
    /// Name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Bytes(_) => "Bytes",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Structure { .. } => "Structure",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::LocalTime(_) => "LocalTime",
            Value::LocalDateTime(_) => "LocalDateTime",
            Value::DateTime(DateTime { zone: Zone::Offset(_), .. }) => "DateTimeWithOffset",
            Value::DateTime(DateTime { zone: Zone::Id(_), .. }) => "DateTimeWithZoneId",
            Value::Duration(_) => "Duration",
            Value::Point(p) if p.is_3d() => "Point3D",
            Value::Point(_) => "Point2D",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}
