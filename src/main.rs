// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! ppewatch - PPE violation lifecycle and notification service

use anyhow::Result;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ppewatch::core::LedgerEvent;
use ppewatch::{Config, Engine, EventBus, NAME, VERSION};

/// ppewatch - PPE violation tracking service
#[derive(Parser, Debug)]
#[command(name = "ppewatch")]
#[command(author = "bad-antics")]
#[command(version = VERSION)]
#[command(about = "Records PPE violations from camera images and tracks supervisor notification")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides server.bind
    #[arg(long)]
    bind: Option<String>,

    /// Data directory for the database
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// PPE classifier endpoint
    #[arg(long)]
    detector_url: Option<String>,

    /// Use the simulated detector even if an endpoint is configured
    #[arg(long)]
    demo: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{} v{}", NAME, VERSION);

    // Load or create configuration
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if let Some(data_dir) = args.data_dir {
        config = config.with_data_dir(data_dir);
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(url) = args.detector_url {
        config.detection.endpoint = Some(url);
    }
    if args.demo {
        config.detection.endpoint = None;
    }
    config.validate()?;

    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let addr = config.server.socket_addr()?;
    let engine = Engine::new(config)?;
    info!(
        "Ledger holds {} violations, directory {} employees",
        engine.manager().store().len(),
        engine.directory().len()
    );

    if let Some(db) = engine.database() {
        let stats = db.get_stats()?;
        info!(
            "Database holds {} violations, {} employees ({} bytes)",
            stats.violation_count, stats.employee_count, stats.size_bytes
        );
    }

    tokio::spawn(log_events(engine.events().clone()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    engine.serve(listener, shutdown_signal()).await?;

    info!("{} shutdown complete", NAME);
    Ok(())
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await
}

/// Resolves once `signal` fires. A listener that fails to install never resolves.
async fn wait_for_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for shutdown signal, serving until killed: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining requests...");
}

/// Mirror ledger events into the debug log
async fn log_events(events: Arc<EventBus>) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => match event.payload {
                LedgerEvent::ViolationRecorded(record) => {
                    debug!(event = event.id, id = %record.id, severity = record.severity.label(), "violation recorded");
                }
                LedgerEvent::ViolationNotified(record) => {
                    debug!(event = event.id, id = %record.id, "violation notified");
                }
                LedgerEvent::LedgerCleared { removed } => {
                    debug!(event = event.id, removed, "ledger cleared");
                }
            },
            Err(RecvError::Lagged(skipped)) => warn!("Event log lagged, skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
