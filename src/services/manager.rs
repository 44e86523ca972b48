//! Generic CRUD over arbitrary tables.
//!
//! [`BaseManager`] borrows the request's [`DbContext`], so everything it does
//! joins the request's transaction when one is open.

use serde_json::Value;

use crate::{
    database::DbContext,
    error::{Error, Result},
    models::records::{
        Fetched, Filters, Page, Payload, Record, RecordId, SqlParam, TableColumns,
    },
    queries::{listing::ListPlan, schema, sql},
    services::activities::{log_activity, Activity, ACTIVITY_TABLE},
    utils::filter::{filter_null_fields, filter_valid_fields, now},
};

/// Default `RETURNING` projection of [`BaseManager::create_data`].
pub const DEFAULT_RETURNING: &str = "id";

/// Keeps domain errors, rewraps everything else as a 500 with context.
fn wrap(message: impl Into<String>) -> impl FnOnce(Error) -> Error {
    let message = message.into();
    move |e| {
        if e.is_domain() {
            return e;
        }
        tracing::error!("{}: {}", message, e);
        Error::Internal(format!("{}: {}", message, e))
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub struct BaseManager<'c> {
    ctx: &'c mut DbContext,
}

impl<'c> BaseManager<'c> {
    pub fn new(ctx: &'c mut DbContext) -> Self {
        Self { ctx }
    }

    pub fn context(&mut self) -> &mut DbContext {
        &mut *self.ctx
    }

    /// Whether a row with `column = value` exists in `table`.
    pub async fn record_exists(
        &mut self,
        table: &str,
        value: impl Into<SqlParam>,
        column: &str,
    ) -> Result<bool> {
        let statement = sql::exists(table, column, value.into(), None)?;
        self.exists(table, statement).await
    }

    async fn exists(&mut self, table: &str, statement: sql::Statement) -> Result<bool> {
        let (_, rows) = self
            .ctx
            .select_rows(&statement.sql, statement.params)
            .await
            .map_err(wrap(format!("Failed to check record in {}", table)))?;

        Ok(rows
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// 404 unless `id` exists. An id that cannot be stored in the `id`
    /// column (`42` against a `uuid` key) is missing by definition.
    async fn verify_record(
        &mut self,
        table: &str,
        columns: &TableColumns,
        id: &RecordId,
    ) -> Result<()> {
        let id_type = columns.type_of("id");
        if !id.fits(id_type) {
            return Err(Error::NotFound("Record not found".to_string()));
        }

        let statement = sql::exists(table, "id", id.into(), id_type)?;
        if !self.exists(table, statement).await? {
            return Err(Error::NotFound("Record not found".to_string()));
        }
        Ok(())
    }

    /// Live column set of `table`; 404 when the table does not exist.
    pub async fn get_table_columns(&mut self, table: &str) -> Result<TableColumns> {
        let columns = schema::get_table_columns(&mut *self.ctx, table)
            .await
            .map_err(wrap(format!("Failed to fetch table columns for '{}'", table)))?;

        if columns.is_empty() {
            return Err(Error::NotFound(format!("Table '{}' not found", table)));
        }
        Ok(columns)
    }

    /// Inserts one or many records.
    ///
    /// Each record is stamped with `created_at` and filtered against the
    /// table's live columns. Returns the `returning` projection (default
    /// `id`) of the first inserted row, or `None` when a conflict skipped the
    /// insert.
    pub async fn create_data(
        &mut self,
        table: &str,
        payload: impl Into<Payload>,
        returning: Option<&[&str]>,
    ) -> Result<Option<Record>> {
        let mut records = payload.into().into_records();
        if records.is_empty() {
            return Err(Error::Validation("No valid data to insert.".to_string()));
        }

        let stamp = now();
        for record in &mut records {
            record.insert("created_at".to_string(), stamp.clone());
        }

        let columns = self.get_table_columns(table).await?;
        let filtered: Vec<Record> = records
            .iter()
            .map(|record| filter_valid_fields(record, &columns))
            .collect();

        if filtered.iter().any(Record::is_empty) {
            return Err(Error::Validation("No valid data to insert.".to_string()));
        }

        let returning: Vec<String> = match returning {
            Some(cols) => cols.iter().map(|c| c.to_string()).collect(),
            None => vec![DEFAULT_RETURNING.to_string()],
        };
        let statement = sql::insert(table, &columns, &filtered, &returning)?;

        let table_name = table.to_string();
        let first = filtered[0].clone();
        let created = self
            .ctx
            .transaction(move |ctx| {
                Box::pin(async move {
                    let row = ctx.commit(&statement.sql, statement.params).await?;
                    if let Some(row) = &row {
                        if table_name != ACTIVITY_TABLE {
                            let entity_id = row.get("id").and_then(id_string);
                            log_activity(ctx, &table_name, Activity::Create, entity_id, &first)
                                .await?;
                        }
                    }
                    Ok(row)
                })
            })
            .await
            .map_err(wrap("Failed to create data"))?;

        if created.is_none() {
            tracing::info!("No new record inserted for {}. Possible conflict.", table);
        }
        Ok(created)
    }

    /// Updates the record `id`; 404 when it does not exist.
    pub async fn update_data(
        &mut self,
        table: &str,
        id: &RecordId,
        data: Record,
    ) -> Result<Option<Record>> {
        let columns = self.get_table_columns(table).await?;
        self.verify_record(table, &columns, id).await?;

        let mut data = data;
        data.insert("updated_at".to_string(), now());

        let filtered = filter_valid_fields(&data, &columns);
        let statement = sql::update(table, &columns, id, &filtered)?;

        let table_name = table.to_string();
        let entity_id = id.to_string();
        let updated = self
            .ctx
            .transaction(move |ctx| {
                Box::pin(async move {
                    let row = ctx.commit(&statement.sql, statement.params).await?;
                    if row.is_some() && table_name != ACTIVITY_TABLE {
                        log_activity(ctx, &table_name, Activity::Update, Some(entity_id), &filtered)
                            .await?;
                    }
                    Ok(row)
                })
            })
            .await
            .map_err(wrap("Failed to update data"))?;

        if updated.is_none() {
            tracing::info!("No record updated for {} with ID {}. Possible conflict.", table, id);
        }
        Ok(updated)
    }

    /// Deletes every listed record in one statement.
    ///
    /// An empty id list is a no-op returning `false`. Ids that cannot be
    /// stored in the `id` column match nothing and are left out.
    pub async fn delete_data(&mut self, table: &str, ids: &[RecordId]) -> Result<bool> {
        if ids.is_empty() {
            return Ok(false);
        }

        let columns = self.get_table_columns(table).await?;
        let id_type = columns.type_of("id");
        let ids: Vec<RecordId> = ids.iter().filter(|id| id.fits(id_type)).cloned().collect();
        if ids.is_empty() {
            return Ok(true);
        }

        let statement = sql::delete(table, &ids, id_type)?;
        self.ctx
            .commit(&statement.sql, statement.params)
            .await
            .map_err(wrap("Failed to delete data"))?;
        Ok(true)
    }

    /// Single lookup when `filters` has an `id`, paginated listing otherwise.
    pub async fn get_data(
        &mut self,
        table: &str,
        filters: Filters,
        columns: Option<&[String]>,
    ) -> Result<Fetched> {
        let filters = filter_null_fields(filters);

        if let Some(raw_id) = filters.get("id") {
            let id: RecordId = raw_id.parse().unwrap_or_else(|never| match never {});
            let table_columns = self.get_table_columns(table).await?;
            self.verify_record(table, &table_columns, &id).await?;

            let statement = sql::select_by_id(table, columns, &id, table_columns.type_of("id"))?;
            let rows = self
                .ctx
                .select(&statement.sql, statement.params)
                .await
                .map_err(wrap(format!("An error occurred while fetching {} data", table)))?;
            return Ok(Fetched::One(rows.into_iter().next()));
        }

        let table_columns = self.get_table_columns(table).await?;
        let plan = ListPlan::from_filters(&filters, &table_columns)?;
        let total = self.count(table, &plan).await?;

        let statement = sql::page(table, columns, &plan)?;
        let rows = self
            .ctx
            .select(&statement.sql, statement.params)
            .await
            .map_err(wrap(format!("An error occurred while fetching {} data", table)))?;

        Ok(Fetched::Page(Page::new(rows, total, plan.page, plan.page_size)))
    }

    async fn count(&mut self, table: &str, plan: &ListPlan) -> Result<i64> {
        let statement = sql::count(table, plan)?;
        let rows = self
            .ctx
            .select(&statement.sql, statement.params)
            .await
            .map_err(wrap("Failed to fetch count"))?;

        Ok(rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }
}
