// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Service composition root

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::{Clock, EventBus, SystemClock};
use crate::api::{build_router, AppState};
use crate::config::Config;
use crate::db::Database;
use crate::detection::{adapter_from_config, DetectionAdapter};
use crate::employees::EmployeeDirectory;
use crate::report::ReportExporter;
use crate::violations::{StatsAggregator, ViolationManager, ViolationStore};

/// Wires storage, detection and the HTTP router from a [`Config`]
pub struct Engine {
    pub config: Arc<Config>,
    database: Option<Arc<Database>>,
    manager: Arc<ViolationManager>,
    directory: Arc<EmployeeDirectory>,
    stats: Arc<StatsAggregator>,
    exporter: Arc<ReportExporter>,
    events: Arc<EventBus>,
    start_time: Instant,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        let detector = adapter_from_config(&config.detection)?;
        Self::with_detector(config, detector, Arc::new(SystemClock))
    }

    /// Build with an explicit detector and clock
    pub fn with_detector(
        config: Config,
        detector: Arc<dyn DetectionAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let zone = config.stats.zone()?;

        let database = if config.database.enabled {
            let db = Database::open(&config.database)
                .with_context(|| format!("opening database at {:?}", config.database.path))?;
            Some(Arc::new(db))
        } else {
            info!("Persistence disabled, ledger is in-memory only");
            None
        };

        let (store, directory) = match &database {
            Some(db) => (
                ViolationStore::with_database(db.clone())?,
                EmployeeDirectory::with_database(db.clone())?,
            ),
            None => (ViolationStore::in_memory(), EmployeeDirectory::in_memory()),
        };
        let store = Arc::new(store);
        let directory = Arc::new(directory);
        let events = Arc::new(EventBus::default());

        let manager = ViolationManager::new(store.clone(), directory.clone(), detector, events.clone())
            .with_clock(clock)
            .with_location(config.detection.location.clone())
            .with_detection_timeout(config.detection.timeout());

        Ok(Self {
            database,
            manager: Arc::new(manager),
            directory,
            stats: Arc::new(StatsAggregator::new(store, zone)),
            exporter: Arc::new(ReportExporter::new(zone, config.export.sheet_name.clone())),
            events,
            start_time: Instant::now(),
            config: Arc::new(config),
        })
    }

    pub fn manager(&self) -> &Arc<ViolationManager> {
        &self.manager
    }

    pub fn directory(&self) -> &Arc<EmployeeDirectory> {
        &self.directory
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn database(&self) -> Option<&Arc<Database>> {
        self.database.as_ref()
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn router(&self) -> Router {
        build_router(AppState {
            manager: self.manager.clone(),
            directory: self.directory.clone(),
            stats: self.stats.clone(),
            exporter: self.exporter.clone(),
            database: self.database.clone(),
            default_export: self.config.export.default_format,
            max_upload_bytes: self.config.server.max_upload_bytes,
        })
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listener.local_addr()?;
        info!("Listening on http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped after {}s", self.uptime());
        Ok(())
    }
}
