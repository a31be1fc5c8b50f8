// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Service error taxonomy and its HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::detection::DetectionError;
use crate::violations::ViolationId;

/// Result alias used across the service layer
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by the violation lifecycle, directory and report operations.
///
/// Every variant is recovered at the request boundary and rendered as the
/// `{success: false, error}` envelope.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed input, rejected before any state is touched
    #[error("{0}")]
    Validation(String),

    /// Request body exceeds `server.max_upload_bytes`
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Unknown violation id
    #[error("unknown violation: {0}")]
    ViolationNotFound(String),

    /// Unknown employee id
    #[error("employee not found: {0}")]
    EmployeeNotFound(String),

    /// Violation id already present in the ledger
    #[error("duplicate violation id: {0}")]
    DuplicateViolation(ViolationId),

    /// Employee id already registered
    #[error("employee already exists: {0}")]
    DuplicateEmployee(String),

    /// Identity could not be assigned after the retry
    #[error("ingest failed: {0}")]
    IngestFailed(String),

    /// Detection adapter errored or timed out
    #[error("detection failed: {0}")]
    Adapter(#[from] DetectionError),

    /// Persistence layer failure; no partial mutation was committed
    #[error("storage failure: {0}")]
    Storage(String),

    /// Report could not be rendered
    #[error("export failed: {0}")]
    Export(String),
}

impl ServiceError {
    /// HTTP status for this error
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ViolationNotFound(_) | Self::EmployeeNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateViolation(_) | Self::DuplicateEmployee(_) => StatusCode::CONFLICT,
            Self::Adapter(_) => StatusCode::BAD_GATEWAY,
            Self::IngestFailed(_) | Self::Storage(_) | Self::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Failure envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "request failed: {}", self);
        } else {
            warn!(status = status.as_u16(), "request rejected: {}", self);
        }

        let body = ErrorEnvelope {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
