use thiserror::Error;

// Import Axum types for HTTP response conversion
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// The custom error type for the application.
///
/// Every variant maps to a human-readable message and an HTTP status code,
/// see [`Error::message`] and [`Error::status_code`].
#[derive(Debug, Error)]
pub enum Error {
    /// An error originating from the sqlx library (pool setup, transaction control).
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A query failed while executing.
    #[error("Database error: {0}")]
    Database(String),

    /// A validation error (bad input, nothing left to write).
    #[error("{0}")]
    Validation(String),

    /// A not found error (resource does not exist).
    #[error("{0}")]
    NotFound(String),

    /// An internal server error.
    #[error("{0}")]
    Internal(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// An error with an explicit status code.
    #[error("{message}")]
    Custom { message: String, status: StatusCode },
}

/// A type alias for `Result<T, Error>` to simplify function signatures.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds an error carrying an arbitrary HTTP status.
    pub fn custom(message: impl Into<String>, status: StatusCode) -> Self {
        Error::Custom {
            message: message.into(),
            status,
        }
    }

    /// HTTP status the web layer should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Custom { status, .. } => *status,
            Error::Sqlx(_)
            | Error::Database(_)
            | Error::Internal(_)
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to a client.
    pub fn message(&self) -> String {
        match self {
            Error::Sqlx(_) => "Database error".to_string(),
            Error::Config(_) => "Configuration error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this is a domain error (bad input, missing record) that must pass
    /// through service layers unchanged.
    pub fn is_domain(&self) -> bool {
        self.status_code().is_client_error()
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Custom { status, .. } if status.is_client_error() => "CLIENT_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Body rejections keep axum's status (400, 415 or 422) and message.
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::custom(rejection.body_text(), rejection.status())
    }
}

/// Convert custom Error to HTTP response
///
/// The body uses the same envelope as successful responses, with empty
/// `data` and `meta`.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Request failed: {}", self);
        }

        let body = serde_json::json!({
            "message": self.message(),
            "status_code": status.as_u16(),
            "code": self.code(),
            "data": [],
            "meta": [],
        });

        (status, Json(body)).into_response()
    }
}
