// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Simulated PPE detector for demo/testing

use async_trait::async_trait;
use rand::prelude::*;
use rand::rngs::StdRng;

use super::{sniff_image_mime, AnnotatedImage, DetectionAdapter, DetectionError, DetectionResult, PpeDetection, RequiredPpe};
use crate::config::DetectionConfig;

/// Produces plausible verdicts without a model.
///
/// The outcome is seeded from the image content, so the same upload always
/// yields the same verdict.
pub struct SimulatedDetector {
    required: RequiredPpe,
    compliance: f64,
}

impl SimulatedDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            required: RequiredPpe::new(&config.required_ppe, config.min_confidence),
            compliance: config.simulated_compliance.clamp(0.0, 1.0),
        }
    }

    fn seed(image: &[u8]) -> u64 {
        // FNV-1a
        image.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, &b| {
            (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
        })
    }

    fn generate_detections(&self, rng: &mut StdRng) -> Vec<PpeDetection> {
        let mut detections = Vec::new();
        for item in self.required.items() {
            if rng.gen::<f64>() < self.compliance {
                detections.push(PpeDetection {
                    class_name: item.clone(),
                    confidence: rng.gen_range(0.55..0.98),
                    bbox: None,
                });
            }
        }
        detections
    }
}

#[async_trait]
impl DetectionAdapter for SimulatedDetector {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn detect(&self, image: &[u8]) -> Result<DetectionResult, DetectionError> {
        let mut rng = StdRng::seed_from_u64(Self::seed(image));
        let detections = self.generate_detections(&mut rng);
        let missing = self.required.missing(&detections);

        let annotated = AnnotatedImage::Inline {
            mime: sniff_image_mime(image).to_string(),
            data: image.to_vec(),
        };

        let result = if missing.is_empty() {
            DetectionResult::compliant()
        } else {
            DetectionResult::violation(missing)
        };
        Ok(result.with_image(annotated))
    }
}
