// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Detection module - adapters over the external PPE classifier

mod classification;
mod remote;
mod simulator;

pub use classification::*;
pub use remote::*;
pub use simulator::*;

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::DetectionConfig;

/// Detector failures. No record is created for a failed detection.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("detector did not answer within {0}ms")]
    Timeout(u64),

    #[error("detector request failed: {0}")]
    Request(String),

    #[error("detector returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for DetectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Rendered detector output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotatedImage {
    /// Hosted by the detector or already a data URL
    Url(String),
    /// Raw encoded image bytes
    Inline { mime: String, data: Vec<u8> },
}

impl AnnotatedImage {
    /// Form sent to the frontend: URLs pass through, bytes become a data URL
    pub fn to_wire(&self) -> String {
        match self {
            AnnotatedImage::Url(url) => url.clone(),
            AnnotatedImage::Inline { mime, data } => format!(
                "data:{};base64,{}",
                mime,
                base64::engine::general_purpose::STANDARD.encode(data)
            ),
        }
    }
}

/// Verdict for one image
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub has_violation: bool,
    pub missing_ppe: Vec<String>,
    pub annotated_image: Option<AnnotatedImage>,
    pub employee_id: Option<String>,
    pub employee_name: Option<String>,
}

impl DetectionResult {
    /// Verdict with every required item present
    pub fn compliant() -> Self {
        Self {
            has_violation: false,
            missing_ppe: Vec::new(),
            annotated_image: None,
            employee_id: None,
            employee_name: None,
        }
    }

    /// Verdict listing missing items
    pub fn violation<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            has_violation: true,
            missing_ppe: missing.into_iter().map(Into::into).collect(),
            annotated_image: None,
            employee_id: None,
            employee_name: None,
        }
    }

    pub fn with_employee(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.employee_id = Some(id.into());
        self.employee_name = name;
        self
    }

    pub fn with_image(mut self, image: AnnotatedImage) -> Self {
        self.annotated_image = Some(image);
        self
    }
}

/// External image classifier contract.
///
/// Implementations may be slow or fail; callers bound them with a timeout and
/// never hold a ledger lock across `detect`.
#[async_trait]
pub trait DetectionAdapter: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn detect(&self, image: &[u8]) -> Result<DetectionResult, DetectionError>;
}

/// Remote classifier when an endpoint is configured, the simulator otherwise
pub fn adapter_from_config(config: &DetectionConfig) -> anyhow::Result<Arc<dyn DetectionAdapter>> {
    match &config.endpoint {
        Some(endpoint) => {
            info!("Using remote PPE classifier at {}", endpoint);
            Ok(Arc::new(RemoteDetector::new(config)?))
        }
        None => {
            info!("No classifier endpoint configured, using simulated detector");
            Ok(Arc::new(SimulatedDetector::new(config)))
        }
    }
}

/// Best-effort MIME type from magic bytes
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'B', b'M', ..] => "image/bmp",
        _ => "application/octet-stream",
    }
}
