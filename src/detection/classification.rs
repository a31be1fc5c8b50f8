// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Required-equipment check over raw classifier detections

use serde::{Deserialize, Serialize};

use crate::violations::normalize_missing_ppe;

/// One object reported by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpeDetection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
}

/// Equipment every worker must wear
#[derive(Debug, Clone)]
pub struct RequiredPpe {
    items: Vec<String>,
    min_confidence: f64,
}

impl RequiredPpe {
    pub fn new<I, S>(items: I, min_confidence: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            items: normalize_missing_ppe(items),
            min_confidence,
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Required items with no detection at or above the confidence floor, in required order
    pub fn missing(&self, detections: &[PpeDetection]) -> Vec<String> {
        let seen: Vec<String> = detections
            .iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .map(|d| d.class_name.trim().to_lowercase())
            .collect();

        self.items
            .iter()
            .filter(|item| !seen.contains(item))
            .cloned()
            .collect()
    }
}

impl Default for RequiredPpe {
    fn default() -> Self {
        Self::new(["helmet", "vest"], 0.1)
    }
}
