// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! HTTP client for a hosted PPE classifier

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::{AnnotatedImage, DetectionAdapter, DetectionError, DetectionResult, PpeDetection, RequiredPpe};
use crate::config::DetectionConfig;
use crate::violations::normalize_missing_ppe;

/// Classifier answer. Either a verdict (`has_violation`/`missing_ppe`) or raw
/// `detections` from which the missing list is derived.
#[derive(Debug, Deserialize)]
pub(crate) struct ClassifierResponse {
    #[serde(default)]
    has_violation: Option<bool>,
    #[serde(default)]
    missing_ppe: Option<Vec<String>>,
    #[serde(default)]
    detections: Vec<PpeDetection>,
    #[serde(default)]
    annotated_image: Option<String>,
    #[serde(default)]
    employee_id: Option<String>,
    #[serde(default)]
    employee_name: Option<String>,
}

impl ClassifierResponse {
    pub(crate) fn into_result(self, required: &RequiredPpe) -> Result<DetectionResult, DetectionError> {
        let missing_ppe = match self.missing_ppe {
            Some(missing) => normalize_missing_ppe(missing),
            None => required.missing(&self.detections),
        };
        let has_violation = self.has_violation.unwrap_or(!missing_ppe.is_empty());

        if has_violation && missing_ppe.is_empty() {
            return Err(DetectionError::InvalidResponse(
                "violation reported without missing equipment".to_string(),
            ));
        }

        Ok(DetectionResult {
            has_violation,
            missing_ppe,
            annotated_image: self
                .annotated_image
                .filter(|s| !s.is_empty())
                .map(AnnotatedImage::Url),
            employee_id: self.employee_id,
            employee_name: self.employee_name,
        })
    }
}

/// Posts the image as multipart field `image` and decodes the JSON verdict
pub struct RemoteDetector {
    client: reqwest::Client,
    endpoint: String,
    required: RequiredPpe,
    timeout: Duration,
}

impl RemoteDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("remote detector requires detection.endpoint"))?;

        let timeout = config.timeout();
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            required: RequiredPpe::new(&config.required_ppe, config.min_confidence),
            timeout,
        })
    }

    fn request_error(&self, err: reqwest::Error) -> DetectionError {
        if err.is_timeout() {
            DetectionError::Timeout(self.timeout.as_millis() as u64)
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl DetectionAdapter for RemoteDetector {
    fn name(&self) -> &str {
        "remote"
    }

    async fn detect(&self, image: &[u8]) -> Result<DetectionResult, DetectionError> {
        let part = Part::bytes(image.to_vec())
            .file_name("upload")
            .mime_str(super::sniff_image_mime(image))?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.request_error(e))?;

        let body: ClassifierResponse = response.json().await.map_err(|e| self.request_error(e))?;
        debug!(endpoint = %self.endpoint, "classifier answered");
        body.into_result(&self.required)
    }
}
