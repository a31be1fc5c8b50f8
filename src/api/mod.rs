// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! HTTP surface over the violation lifecycle service

mod handlers;

pub use handlers::*;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::db::Database;
use crate::employees::EmployeeDirectory;
use crate::report::{ExportFormat, ReportExporter};
use crate::violations::{StatsAggregator, ViolationManager};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ViolationManager>,
    pub directory: Arc<EmployeeDirectory>,
    pub stats: Arc<StatsAggregator>,
    pub exporter: Arc<ReportExporter>,
    /// Present when persistence is enabled
    pub database: Option<Arc<Database>>,
    pub default_export: ExportFormat,
    pub max_upload_bytes: usize,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/upload_image", post(upload_image_handler))
        .route("/api/violations", get(violations_handler))
        .route("/api/get_active_violations", get(active_violations_handler))
        .route("/api/mark_notified", post(mark_notified_handler))
        .route("/api/clear_data", post(clear_data_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/export_excel", get(export_handler))
        .route("/api/employees", get(employees_handler))
        .route("/api/add_employee", post(add_employee_handler))
        .route("/api/delete_employee", post(delete_employee_handler))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}
