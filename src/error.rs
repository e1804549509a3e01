//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the service.
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - [`ErrorKind`]: Stable machine-readable classification sent to clients
//! - Module-specific errors (e.g., [`EnrichmentError`]) for detailed handling
//!
//! Every [`Error`] converts into an HTTP response carrying a JSON body of the
//! form `{"error": ..., "kind": ..., "details": ...}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::enrichment::EnrichmentError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing client input
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Target row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Metadata service error
    #[error("Metadata service error: {0}")]
    Metadata(#[from] EnrichmentError),

    /// Request exceeded the server-side deadline
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Stable, machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
    Network,
    UpstreamResponse,
    Timeout,
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error, looking through any added context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database(_) | Self::Migration(_) => ErrorKind::Storage,
            Self::Metadata(e) => match e {
                EnrichmentError::Network(_) => ErrorKind::Network,
                EnrichmentError::Timeout(_) => ErrorKind::Timeout,
                EnrichmentError::Status { .. } | EnrichmentError::Parse(_) => {
                    ErrorKind::UpstreamResponse
                }
            },
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Network | ErrorKind::UpstreamResponse => StatusCode::BAD_GATEWAY,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short human-readable summary for the `error` field.
    fn summary(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::Storage => "Storage failure",
            ErrorKind::Network => "Metadata service unreachable",
            ErrorKind::UpstreamResponse => "Metadata service returned an invalid response",
            ErrorKind::Timeout => "Operation timed out",
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(value_type = String, example = "Invalid request")]
    pub error: &'static str,
    pub kind: ErrorKind,
    pub details: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = ?self.kind(), "{}", self);
        } else {
            tracing::debug!(kind = ?self.kind(), "{}", self);
        }

        let body = ErrorBody {
            error: self.summary(),
            kind: self.kind(),
            details: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}
