// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! ppewatch - PPE violation lifecycle and notification service
//!
//! Receives images, asks a PPE classifier which required equipment is
//! missing, records violations in a ledger and tracks whether a supervisor
//! has been notified about each one.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      HTTP API (axum)                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌──────────────────┐  ┌──────────────┐   │
//! │  │ Detection │→ │ ViolationManager │→ │ EventBus     │   │
//! │  │ Adapter   │  └──────────────────┘  └──────────────┘   │
//! │  └───────────┘       ↓        ↑                          │
//! │  ┌──────────────────────┐  ┌──────────┐  ┌───────────┐   │
//! │  │ ViolationStore       │← │ Stats    │  │ Employee  │   │
//! │  │ (ledger)             │← │ Report   │  │ Directory │   │
//! │  └──────────────────────┘  └──────────┘  └───────────┘   │
//! │       ↓                                        ↓         │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │                 SQLite (optional)                  │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod employees;
pub mod error;
pub mod report;
pub mod violations;

// Re-exports for convenience
pub use config::Config;
pub use core::{Engine, EventBus};
pub use db::Database;
pub use detection::{DetectionAdapter, DetectionResult};
pub use employees::EmployeeDirectory;
pub use error::{ServiceError, ServiceResult};
pub use report::{ExportFormat, ReportExporter};
pub use violations::{ViolationId, ViolationManager, ViolationRecord, ViolationStore};

/// ppewatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ppewatch name
pub const NAME: &str = "ppewatch";
