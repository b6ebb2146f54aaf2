use std::time::Duration;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::database::MenuId;

#[derive(Error, Debug)]
pub enum StockError {
    #[error("Menu {0} not found")]
    NotFound(MenuId),

    #[error("Timed out after {waited:?} waiting for the stock lock of menu {menu_id}")]
    LockTimeout { menu_id: MenuId, waited: Duration },

    #[error("Unexpected fault: {0}")]
    UnexpectedFault(String),
}

impl StockError {
    /// Only a lock timeout is worth retrying; the core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StockError::LockTimeout { .. })
    }
}

impl From<redis::RedisError> for StockError {
    fn from(err: redis::RedisError) -> Self {
        StockError::UnexpectedFault(format!("redis: {err}"))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Stock(#[from] StockError),
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::Stock(StockError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Stock(StockError::LockTimeout { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Stock(StockError::UnexpectedFault(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {self}");
        }

        let body = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "status": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Unknown"),
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
