//! Filtering of untrusted payloads and query filters

use chrono::Utc;
use serde_json::Value;

use crate::models::records::{Filters, Record, TableColumns};

/// Keeps only keys that are live columns of the table and carry a value.
///
/// When nothing survives and the table has an `updated_at` column, the
/// result is `{"updated_at": now}` so that the write still touches the row.
pub fn filter_valid_fields(record: &Record, columns: &TableColumns) -> Record {
    let mut filtered: Record = record
        .iter()
        .filter(|(key, value)| columns.contains(key) && !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if filtered.is_empty() {
        tracing::warn!(
            "No valid fields found in the incoming data. Please check the provided fields."
        );
        if columns.contains("updated_at") {
            filtered.insert("updated_at".to_string(), now());
        }
    }

    filtered
}

/// Drops filters whose value is empty or the literal `null`.
pub fn filter_null_fields(filters: Filters) -> Filters {
    filters
        .into_iter()
        .filter(|(_, value)| !value.is_empty() && value != "null")
        .collect()
}

/// Current time as an RFC 3339 JSON string.
pub fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}
