//! Conversion between dynamic values and Postgres wire types.
//!
//! Tables are not known at compile time, so parameters are bound from
//! [`SqlParam`] and rows are decoded column by column into JSON according to
//! the column's Postgres type name.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};
use uuid::Uuid;

use crate::models::records::{Record, SqlParam};

/// Bind one parameter to a PostgreSQL query.
pub fn bind_param(
    query: Query<'_, Postgres, PgArguments>,
    param: SqlParam,
) -> Query<'_, Postgres, PgArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(v) => query.bind(v),
        SqlParam::Int(v) => query.bind(v),
        SqlParam::Float(v) => query.bind(v),
        SqlParam::Text(v) => query.bind(v),
        SqlParam::Uuid(v) => query.bind(v),
        SqlParam::Timestamp(v) => query.bind(v),
        SqlParam::Json(v) => query.bind(sqlx::types::Json(v)),
    }
}

/// Bind all parameters in order.
pub fn bind_params(
    query: Query<'_, Postgres, PgArguments>,
    params: Vec<SqlParam>,
) -> Query<'_, Postgres, PgArguments> {
    params.into_iter().fold(query, bind_param)
}

/// Column names of a row, in select order.
pub fn column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Decode a row into a column-name keyed record.
pub fn row_to_record(row: &PgRow) -> Record {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| (col.name().to_string(), decode_column(row, idx, col.type_info().name())))
        .collect()
}

/// Decode a row into positional values.
pub fn row_to_values(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_column(row, idx, col.type_info().name()))
        .collect()
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => get::<bool>(row, idx).map(Value::Bool),
        "INT2" => get::<i16>(row, idx).map(Value::from),
        "INT4" => get::<i32>(row, idx).map(Value::from),
        "INT8" => get::<i64>(row, idx).map(Value::from),
        "FLOAT4" => get::<f32>(row, idx).map(|v| float(v as f64)),
        "FLOAT8" => get::<f64>(row, idx).map(float),
        "NUMERIC" => get::<Decimal>(row, idx).map(decimal),
        "UUID" => get::<Uuid>(row, idx).map(|v| Value::String(v.to_string())),
        "JSON" | "JSONB" => get::<Value>(row, idx),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx).map(|v| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx).map(|v| Value::String(v.to_string())),
        "DATE" => get::<NaiveDate>(row, idx).map(|v| Value::String(v.to_string())),
        "TIME" => get::<NaiveTime>(row, idx)
            .map(|v| Value::String(v.format("%H:%M:%S").to_string())),
        "BYTEA" => get::<Vec<u8>>(row, idx).map(|v| Value::String(hex::encode(v))),
        "TEXT[]" | "VARCHAR[]" => get::<Vec<String>>(row, idx).map(Value::from),
        "INT4[]" => get::<Vec<i32>>(row, idx).map(Value::from),
        "INT8[]" => get::<Vec<i64>>(row, idx).map(Value::from),
        "UUID[]" => get::<Vec<Uuid>>(row, idx)
            .map(|v| Value::from(v.iter().map(Uuid::to_string).collect::<Vec<_>>())),
        _ => decode_text(row, idx),
    }
    .unwrap_or(Value::Null)
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to decode column {}: {}", idx, e);
            None
        }
    }
}

/// Text-like and user-defined types (enums, citext, ...) use their text form.
fn decode_text(row: &PgRow, idx: usize) -> Option<Value> {
    if let Ok(value) = row.try_get::<Option<String>, _>(idx) {
        return value.map(Value::String);
    }
    row.try_get_unchecked::<Option<String>, _>(idx)
        .ok()
        .flatten()
        .map(Value::String)
}

fn float(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(v.to_string()))
}

fn decimal(v: Decimal) -> Value {
    match v.to_f64() {
        Some(f) => float(f),
        None => Value::String(v.to_string()),
    }
}
