//! Uniform response envelope
//!
//! Every successful API answer has the shape
//! `{"message": ..., "status_code": ..., "data": ..., "meta": ...}`.
//! Absent `data` and `meta` render as empty arrays.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::models::records::{Fetched, Page};

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub message: String,
    pub status_code: u16,
    pub data: Value,
    pub meta: Value,
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self {
            message: "Success".to_string(),
            status_code: StatusCode::OK.as_u16(),
            data: Value::Array(Vec::new()),
            meta: Value::Array(Vec::new()),
        }
    }
}

impl ApiResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status_code = status.as_u16();
        self
    }

    /// Sets `data`; `null` keeps the empty-array default.
    pub fn data<T: Serialize>(mut self, data: T) -> Self {
        self.data = or_empty(serde_json::to_value(data).unwrap_or(Value::Null));
        self
    }

    pub fn meta<T: Serialize>(mut self, meta: T) -> Self {
        self.meta = or_empty(serde_json::to_value(meta).unwrap_or(Value::Null));
        self
    }

    /// Splits a page into `data` and `meta`.
    pub fn page<T: Serialize>(self, page: Page<T>) -> Self {
        self.data(page.data).meta(page.meta)
    }

    pub fn fetched(self, fetched: Fetched) -> Self {
        match fetched {
            Fetched::One(record) => self.data(record),
            Fetched::Page(page) => self.page(page),
        }
    }
}

fn or_empty(value: Value) -> Value {
    if value.is_null() {
        Value::Array(Vec::new())
    } else {
        value
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
