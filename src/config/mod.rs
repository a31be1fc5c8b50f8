// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Configuration module

use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::report::ExportFormat;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory
    pub data_dir: PathBuf,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Detection adapter configuration
    pub detection: DetectionConfig,

    /// Statistics configuration
    pub stats: StatsConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Report export configuration
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            server: ServerConfig::default(),
            detection: DetectionConfig::default(),
            stats: StatsConfig::default(),
            database: DatabaseConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            // Create parent directories
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        self.server.socket_addr()?;
        self.stats.zone()?;
        self.export.check_sheet_name()?;
        if self.detection.timeout_secs == 0 {
            return Err(anyhow!("detection.timeout_secs must be at least 1"));
        }
        if self.detection.required_ppe.iter().all(|item| item.trim().is_empty()) {
            return Err(anyhow!("detection.required_ppe must name at least one item"));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(anyhow!("server.max_upload_bytes must be positive"));
        }
        Ok(())
    }

    /// Point the database at `data_dir` unless it was configured explicitly
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        if self.database.path == DatabaseConfig::default().path {
            self.database.path = data_dir.join("ppewatch.db");
        }
        self.data_dir = data_dir;
        self
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("ppewatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,

    /// Largest accepted request body (image uploads)
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| anyhow!("invalid server.bind {:?}: {}", self.bind, e))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Hosted classifier URL; the simulated detector is used when unset
    pub endpoint: Option<String>,

    /// Upper bound on one classifier call
    pub timeout_secs: u64,

    /// Equipment every worker must wear
    pub required_ppe: Vec<String>,

    /// Minimum confidence for a detection to count as worn
    pub min_confidence: f64,

    /// Location label stamped on new violations
    pub location: String,

    /// Probability that the simulated detector sees each required item
    pub simulated_compliance: f64,
}

impl DetectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 30,
            required_ppe: vec!["helmet".to_string(), "vest".to_string()],
            min_confidence: 0.1,
            location: "Main Camera".to_string(),
            simulated_compliance: 0.6,
        }
    }
}

/// Statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Fixed offset from UTC, in minutes, that defines "today"
    pub utc_offset_minutes: i32,
}

impl StatsConfig {
    pub fn zone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or_else(|| anyhow!("stats.utc_offset_minutes out of range: {}", self.utc_offset_minutes))
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { utc_offset_minutes: 0 }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Persist the ledger and directory; in-memory only when disabled
    pub enabled: bool,

    /// Database path
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/ppewatch.db"),
        }
    }
}

const MAX_SHEET_NAME_CHARS: usize = 31;
const INVALID_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Report export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Format served when the request does not ask for one
    pub default_format: ExportFormat,

    /// Worksheet name in XLSX reports
    pub sheet_name: String,
}

impl ExportConfig {
    /// Excel rejects worksheet names that break these rules at write time
    pub fn check_sheet_name(&self) -> Result<()> {
        let name = &self.sheet_name;
        if name.trim().is_empty() {
            return Err(anyhow!("export.sheet_name must not be empty"));
        }
        if name.chars().count() > MAX_SHEET_NAME_CHARS {
            return Err(anyhow!(
                "export.sheet_name {:?} is longer than {} characters",
                name,
                MAX_SHEET_NAME_CHARS
            ));
        }
        if let Some(c) = name.chars().find(|c| INVALID_SHEET_NAME_CHARS.contains(c)) {
            return Err(anyhow!("export.sheet_name {:?} contains invalid character {:?}", name, c));
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(anyhow!("export.sheet_name {:?} must not start or end with an apostrophe", name));
        }
        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: ExportFormat::Xlsx,
            sheet_name: "PPE Violations".to_string(),
        }
    }
}
