use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A row of an arbitrary table: column name to value.
pub type Record = serde_json::Map<String, Value>;

/// Listing filters as they arrive from a query string.
pub type Filters = BTreeMap<String, String>;

/// A value bound to a `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlParam::Int(i),
                None => SqlParam::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlParam::Text(s),
            other => SqlParam::Json(other),
        }
    }
}

impl From<&Value> for SqlParam {
    fn from(value: &Value) -> Self {
        SqlParam::from(value.clone())
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

impl From<Uuid> for SqlParam {
    fn from(value: Uuid) -> Self {
        SqlParam::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(value: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(value)
    }
}

/// Primary key of a record.
///
/// Parsed from text so ids bind with their natural Postgres type instead of
/// `text`, which would not compare against `uuid` or integer columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Uuid(Uuid),
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Reads an id out of a JSON value (string or integer).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(i) => Value::from(*i),
            other => Value::String(other.to_string()),
        }
    }

    /// Whether the id can be stored in a column of Postgres type `udt_name`.
    ///
    /// Only `uuid` and integer keys are checked; any other type accepts every
    /// id.
    pub fn fits(&self, udt_name: Option<&str>) -> bool {
        match (udt_name, self) {
            (Some("uuid"), id) => matches!(id, RecordId::Uuid(_)),
            (Some("int2"), RecordId::Int(i)) => i16::try_from(*i).is_ok(),
            (Some("int4"), RecordId::Int(i)) => i32::try_from(*i).is_ok(),
            (Some("int8"), RecordId::Int(_)) => true,
            (Some("int2" | "int4" | "int8"), _) => false,
            _ => true,
        }
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(uuid) = Uuid::parse_str(s) {
            return Ok(RecordId::Uuid(uuid));
        }
        if let Ok(i) = s.parse::<i64>() {
            return Ok(RecordId::Int(i));
        }
        Ok(RecordId::Text(s.to_string()))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Uuid(u) => write!(f, "{}", u),
            RecordId::Int(i) => write!(f, "{}", i),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&RecordId> for SqlParam {
    fn from(id: &RecordId) -> Self {
        match id {
            RecordId::Uuid(u) => SqlParam::Uuid(*u),
            RecordId::Int(i) => SqlParam::Int(*i),
            RecordId::Text(s) => SqlParam::Text(s.clone()),
        }
    }
}

/// Create payload: a single record or a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    One(Record),
    Many(Vec<Record>),
}

impl Payload {
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Payload::One(record) => vec![record],
            Payload::Many(records) => records,
        }
    }
}

impl From<Record> for Payload {
    fn from(record: Record) -> Self {
        Payload::One(record)
    }
}

impl From<Vec<Record>> for Payload {
    fn from(records: Vec<Record>) -> Self {
        Payload::Many(records)
    }
}

/// Live column set of a table, with each column's Postgres type name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableColumns {
    columns: BTreeMap<String, String>,
}

impl TableColumns {
    pub fn new(columns: BTreeMap<String, String>) -> Self {
        Self { columns }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// `udt_name` of the column, e.g. `uuid`, `int4`, `timestamptz`.
    pub fn type_of(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for TableColumns {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty.to_string()))
                .collect(),
        )
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// One page of a listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        Self {
            data,
            meta: PageMeta {
                page,
                page_size,
                total,
                total_pages: total_pages(total, page_size),
            },
        }
    }
}

/// `ceil(total / page_size)`, 0 when there is nothing to page through.
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 0;
    }
    (total - 1) / page_size + 1
}

/// Result of a `get_data` call: a single lookup or a page.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Fetched {
    One(Option<Record>),
    Page(Page<Record>),
}
