// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AppState;
use crate::db::DatabaseStats;
use crate::employees::{EmployeeRecord, NewEmployee};
use crate::error::{ServiceError, ServiceResult};
use crate::report::ExportFormat;
use crate::violations::{ViolationId, ViolationRecord, ViolationRef, ViolationStats};

fn multipart_error(err: MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge("Image exceeds upload limit".to_string())
    } else {
        ServiceError::Validation(err.body_text())
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ServiceResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub violations: usize,
    pub employees: usize,
    /// Row counts and file size on disk; absent when running in-memory
    pub database: Option<DatabaseStats>,
}

pub async fn healthz_handler(State(state): State<AppState>) -> ServiceResult<Json<HealthResponse>> {
    let database = match &state.database {
        Some(db) => Some(db.get_stats().map_err(|e| ServiceError::Storage(e.to_string()))?),
        None => None,
    };
    Ok(Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        violations: state.manager.store().len(),
        employees: state.directory.len(),
        database,
    }))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub has_violations: bool,
    pub message: String,
    pub missing_ppe: Vec<String>,
    pub annotated_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation_id: Option<ViolationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
}

pub async fn upload_image_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServiceResult<Json<UploadResponse>> {
    let mut multipart =
        multipart.map_err(|_| ServiceError::Validation("No image uploaded".to_string()))?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some("image") {
            continue;
        }
        if field.file_name() == Some("") {
            return Err(ServiceError::Validation("No image selected".to_string()));
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;
        image = Some(bytes);
        break;
    }
    let image = image.ok_or_else(|| ServiceError::Validation("No image uploaded".to_string()))?;
    debug!(bytes = image.len(), "image received");

    let result = state.manager.ingest(&image).await?;
    let message = if result.violation {
        format!("Missing PPE: {}", result.missing_ppe.join(", "))
    } else {
        "All required PPE detected".to_string()
    };

    Ok(Json(UploadResponse {
        success: true,
        has_violations: result.violation,
        message,
        missing_ppe: result.missing_ppe,
        annotated_image: result.annotated_image.as_ref().map(|img| img.to_wire()),
        violation_id: result.record.as_ref().map(|r| r.id),
        employee_id: result.record.and_then(|r| r.employee_id),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<ViolationRecord>,
}

pub async fn violations_handler(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ServiceResult<Json<HistoryResponse>> {
    let Query(query) = query.map_err(|e| ServiceError::Validation(e.body_text()))?;
    Ok(Json(HistoryResponse {
        history: state.manager.history(query.limit),
    }))
}

#[derive(Debug, Serialize)]
pub struct ActiveViolationsResponse {
    pub violations: Vec<ViolationRecord>,
}

pub async fn active_violations_handler(
    State(state): State<AppState>,
) -> Json<ActiveViolationsResponse> {
    Json(ActiveViolationsResponse {
        violations: state.manager.pending(),
    })
}

#[derive(Debug, Deserialize)]
pub struct MarkNotifiedRequest {
    #[serde(default)]
    pub violation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkNotifiedResponse {
    pub success: bool,
    pub violation_id: ViolationId,
    pub notified_at: Option<DateTime<Utc>>,
    /// False when the violation had already been acknowledged
    pub changed: bool,
}

pub async fn mark_notified_handler(
    State(state): State<AppState>,
    payload: Result<Json<MarkNotifiedRequest>, JsonRejection>,
) -> ServiceResult<Json<MarkNotifiedResponse>> {
    let request = json_body(payload)?;
    let reference: ViolationRef = request
        .violation_id
        .ok_or_else(|| ServiceError::Validation("Missing violation id".to_string()))?
        .parse()?;

    let outcome = state.manager.acknowledge_ref(reference, state.manager.now())?;
    Ok(Json(MarkNotifiedResponse {
        success: true,
        violation_id: outcome.record.id,
        notified_at: outcome.record.notified_at,
        changed: outcome.transitioned,
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

pub async fn clear_data_handler(State(state): State<AppState>) -> ServiceResult<Json<MessageResponse>> {
    let removed = state.manager.clear()?;
    debug!(removed, "ledger cleared over http");
    Ok(MessageResponse::ok("All violation data cleared"))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<ViolationStats> {
    Json(state.stats.compute(state.manager.now()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub async fn export_handler(
    State(state): State<AppState>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> ServiceResult<Response> {
    let Query(query) = query.map_err(|e| ServiceError::Validation(e.body_text()))?;
    let format = match query.format.as_deref() {
        Some(requested) => requested.parse::<ExportFormat>()?,
        None => state.default_export,
    };

    let records = state.manager.store().list();
    let report = state.exporter.export(&records, format, state.manager.now())?;
    let disposition = format!("attachment; filename=\"{}\"", report.filename);

    Ok((
        [
            (header::CONTENT_TYPE, report.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct EmployeesResponse {
    pub employees: Vec<EmployeeRecord>,
}

pub async fn employees_handler(State(state): State<AppState>) -> Json<EmployeesResponse> {
    Json(EmployeesResponse {
        employees: state.directory.list(),
    })
}

#[derive(Debug, Serialize)]
pub struct EmployeeResponse {
    pub success: bool,
    pub message: String,
    pub employee: EmployeeRecord,
}

pub async fn add_employee_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewEmployee>, JsonRejection>,
) -> ServiceResult<Json<EmployeeResponse>> {
    let employee = state.directory.add(json_body(payload)?)?;
    Ok(Json(EmployeeResponse {
        success: true,
        message: "Employee added successfully".to_string(),
        employee,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteEmployeeRequest {
    #[serde(default)]
    pub employee_id: String,
}

pub async fn delete_employee_handler(
    State(state): State<AppState>,
    payload: Result<Json<DeleteEmployeeRequest>, JsonRejection>,
) -> ServiceResult<Json<MessageResponse>> {
    let request = json_body(payload)?;
    state.directory.remove(&request.employee_id)?;
    Ok(MessageResponse::ok("Employee deleted successfully"))
}
