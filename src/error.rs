//! Service error type shared by every operation.
//!
//! Each variant maps to one structured error kind on the wire:
//! `{"error": {"kind": "...", "message": "..."}}`, plus kind-specific
//! fields (`details` for validation, `deviceId` for unresolved devices).
//! Errors never cross the REST boundary as panics.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("request failed validation")]
    InvalidInput { violations: Vec<String> },
    #[error("no assignment found for device {device_id}")]
    UnknownDevice { device_id: String },
    #[error("event has no assigned participants")]
    NoParticipants,
    #[error("caller identity is missing or unknown")]
    Unauthorized,
    #[error("administrator role required")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("device is assigned to an event that has not ended")]
    DeviceInUse,
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable kind string.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput { .. } => "InvalidInput",
            AppError::UnknownDevice { .. } => "UnknownDevice",
            AppError::NoParticipants => "NoParticipants",
            AppError::Unauthorized => "Unauthorized",
            AppError::Forbidden => "Forbidden",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::DeviceInUse => "DeviceInUse",
            AppError::Storage(_) => "StorageError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::UnknownDevice { .. } | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NoParticipants | AppError::Conflict(_) | AppError::DeviceInUse => {
                StatusCode::CONFLICT
            }
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        // Unique-index violations are caller errors (duplicate device,
        // double assignment), not storage failures.
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return AppError::Conflict("record already exists".to_string());
            }
        }
        AppError::Storage(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        match &self {
            AppError::InvalidInput { violations } => {
                body["error"]["details"] = json!(violations);
            }
            AppError::UnknownDevice { device_id } => {
                body["error"]["deviceId"] = json!(device_id);
            }
            AppError::Storage(e) => {
                tracing::error!(err = %e, "storage failure");
            }
            _ => {}
        }
        (self.status(), Json(body)).into_response()
    }
}
