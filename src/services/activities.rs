use serde_json::Value;

use crate::{
    database::DbContext,
    error::Result,
    models::records::Record,
    queries::{schema, sql},
    utils::filter::{filter_valid_fields, now},
};

/// Table receiving one row per create/update on any other table.
pub const ACTIVITY_TABLE: &str = "activities";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Create,
    Update,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Create => "create",
            Activity::Update => "update",
        }
    }
}

/// Builds the activity row for a write on `table`.
pub fn activity_entry(
    table: &str,
    activity: Activity,
    entity_id: Option<String>,
    data: &Record,
) -> Record {
    let mut entry = Record::new();
    entry.insert("table_name".to_string(), Value::String(table.to_string()));
    entry.insert(
        "entity_id".to_string(),
        entity_id.map(Value::String).unwrap_or(Value::Null),
    );
    entry.insert("action".to_string(), Value::String(activity.as_str().to_string()));
    entry.insert("data".to_string(), Value::Object(data.clone()));
    entry.insert("created_at".to_string(), now());
    entry
}

/// Appends an activity entry through the caller's context.
///
/// The entry is filtered against the live columns of the activity table like
/// any other record. When the table does not exist the entry is skipped.
pub async fn log_activity(
    ctx: &mut DbContext,
    table: &str,
    activity: Activity,
    entity_id: Option<String>,
    data: &Record,
) -> Result<()> {
    if table == ACTIVITY_TABLE {
        return Ok(());
    }

    let columns = schema::get_table_columns(ctx, ACTIVITY_TABLE).await?;
    if columns.is_empty() {
        tracing::warn!(
            "Activity table '{}' not found, skipping {} log for {}",
            ACTIVITY_TABLE,
            activity.as_str(),
            table
        );
        return Ok(());
    }

    let entry = filter_valid_fields(&activity_entry(table, activity, entity_id, data), &columns);
    let statement = sql::insert(ACTIVITY_TABLE, &columns, &[entry], &[])?;
    ctx.commit(&statement.sql, statement.params).await?;

    tracing::debug!(table, action = activity.as_str(), "Activity logged");
    Ok(())
}
