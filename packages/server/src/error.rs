use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

use crate::ingest::IngestError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`,
    /// `TENANT_MISSING`, `NOT_FOUND`, `STORAGE_ERROR`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "File 'part.stl' is 120000000 bytes, over the limit")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// Tenant headers missing or malformed; the upstream gateway should
    /// always install them.
    TenantMissing,
    /// Used for both "does not exist" and "belongs to another tenant" so
    /// existence never leaks across organizations.
    NotFound(String),
    Storage(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TenantMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TENANT_MISSING",
                    message: "Organization context is required".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::Storage(detail) => {
                tracing::error!("Storage error: {}", detail);
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        code: "STORAGE_ERROR",
                        message: "Object storage request failed".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {key}")),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::EmptyUpload
            | IngestError::InvalidFilename { .. }
            | IngestError::UnsupportedType { .. }
            | IngestError::FileTooLarge { .. } => AppError::Validation(err.to_string()),
            IngestError::NotFoundOrDenied => AppError::NotFound("Model not found".into()),
            IngestError::Storage(e) => AppError::Storage(e.to_string()),
            IngestError::Persistence(e) => AppError::Internal(e.to_string()),
        }
    }
}
