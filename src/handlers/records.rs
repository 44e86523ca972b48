//! Record CRUD handlers
//!
//! Thin layer over [`BaseManager`]: each request gets its own
//! [`crate::database::DbContext`], the table name is checked against the
//! exposed set, and results are wrapped in the [`ApiResponse`] envelope.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::json;

use crate::{
    error::{Error, Result},
    handlers::extractors::JsonBody,
    models::{
        requests::DeleteRecordsRequest, ApiResponse, Fetched, Filters, Payload, Record, RecordId,
    },
    services::manager::BaseManager,
    state::AppState,
};

fn ensure_exposed(state: &AppState, table: &str) -> Result<()> {
    if !state.is_exposed(table) {
        return Err(Error::NotFound(format!("Table '{}' not found", table)));
    }
    Ok(())
}

fn parse_id(raw: &str) -> RecordId {
    raw.parse().unwrap_or_else(|never| match never {})
}

/// GET /api/v1/records/{table}
///
/// Query string keys are equality filters, plus `page`, `page_size`,
/// `sort_by` and `order_by`.
pub async fn list_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(filters): Query<Filters>,
) -> Result<ApiResponse> {
    ensure_exposed(&state, &table)?;

    // An `id` here would turn the listing into a single lookup.
    let mut filters = filters;
    filters.remove("id");

    let mut ctx = state.db.context();
    let fetched = BaseManager::new(&mut ctx)
        .get_data(&table, filters, None)
        .await?;

    Ok(ApiResponse::default().fetched(fetched))
}

/// GET /api/v1/records/{table}/{id}
pub async fn get_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<ApiResponse> {
    ensure_exposed(&state, &table)?;

    let mut filters = Filters::new();
    filters.insert("id".to_string(), id);

    let mut ctx = state.db.context();
    match BaseManager::new(&mut ctx)
        .get_data(&table, filters, None)
        .await?
    {
        Fetched::One(Some(record)) => Ok(ApiResponse::default().data(record)),
        _ => Err(Error::NotFound("Record not found".to_string())),
    }
}

/// POST /api/v1/records/{table}
///
/// Accepts a single object or an array of objects.
///
/// # HTTP Status Codes
/// - `201 CREATED`: Inserted (`data` holds the returned id, `[]` on conflict)
/// - `400 BAD_REQUEST`: Nothing valid to insert
/// - `404 NOT_FOUND`: Unknown table
pub async fn create_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    JsonBody(payload): JsonBody<Payload>,
) -> Result<ApiResponse> {
    ensure_exposed(&state, &table)?;

    let mut ctx = state.db.context();
    let created = BaseManager::new(&mut ctx)
        .create_data(&table, payload, None)
        .await?;

    tracing::info!(table = %table, created = created.is_some(), "Records created");
    Ok(ApiResponse::new("Record created")
        .status(StatusCode::CREATED)
        .data(created))
}

/// PATCH /api/v1/records/{table}/{id}
pub async fn update_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
    JsonBody(data): JsonBody<Record>,
) -> Result<ApiResponse> {
    ensure_exposed(&state, &table)?;

    let mut ctx = state.db.context();
    let updated = BaseManager::new(&mut ctx)
        .update_data(&table, &parse_id(&id), data)
        .await?;

    Ok(ApiResponse::new("Record updated").data(updated))
}

/// DELETE /api/v1/records/{table}/{id}
pub async fn delete_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, String)>,
) -> Result<ApiResponse> {
    ensure_exposed(&state, &table)?;

    let mut ctx = state.db.context();
    let deleted = BaseManager::new(&mut ctx)
        .delete_data(&table, &[parse_id(&id)])
        .await?;

    Ok(ApiResponse::new("Record deleted").data(json!({ "deleted": deleted })))
}

/// DELETE /api/v1/records/{table}
///
/// Body: `{"ids": [...]}`. An empty list deletes nothing.
pub async fn delete_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    JsonBody(request): JsonBody<DeleteRecordsRequest>,
) -> Result<ApiResponse> {
    ensure_exposed(&state, &table)?;

    let ids = request.record_ids();
    let mut ctx = state.db.context();
    let deleted = BaseManager::new(&mut ctx).delete_data(&table, &ids).await?;

    let message = if deleted {
        "Records deleted"
    } else {
        "No records deleted"
    };
    Ok(ApiResponse::new(message).data(json!({ "deleted": deleted })))
}
