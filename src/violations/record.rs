// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Violation records and identity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Namespace for identities regenerated after an id collision
const RETRY_NAMESPACE: &[u8] = b"ppewatch/violation-retry";

/// Unique violation identifier, independent of the detection timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViolationId(Uuid);

impl ViolationId {
    /// Fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic replacement for an id that collided on append.
    ///
    /// The same colliding id always yields the same replacement.
    pub fn regenerate(&self) -> Self {
        Self(Uuid::new_v5(&self.0, RETRY_NAMESPACE))
    }
}

impl Default for ViolationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViolationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ViolationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Source of violation identities, injectable for tests
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> ViolationId;
}

/// Random UUID v4 identities
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> ViolationId {
        ViolationId::new()
    }
}

/// Severity derived from the number of missing items
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn for_missing(count: usize) -> Self {
        if count > 1 {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Medium => "Medium",
            Severity::High => "High",
        }
    }
}

/// Trim, lower-case and de-duplicate equipment names, keeping first occurrence order
pub fn normalize_missing_ppe<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let name = item.as_ref().trim().to_lowercase();
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Everything needed to create a record except its identity
#[derive(Debug, Clone)]
pub struct NewViolation {
    pub employee_id: Option<String>,
    pub employee_name: Option<String>,
    pub missing_ppe: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub annotated_image: Option<String>,
}

/// A recorded PPE violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub id: ViolationId,
    pub employee_id: Option<String>,
    pub employee_name: Option<String>,
    pub missing_ppe: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub notified: bool,
    pub notified_at: Option<DateTime<Utc>>,
    pub location: String,
    pub severity: Severity,

    /// Rendered detector output; held in memory only
    #[serde(skip)]
    pub annotated_image: Option<String>,
}

impl ViolationRecord {
    /// Build an unnotified record. Fails when no missing item survives normalisation.
    pub fn new(id: ViolationId, draft: NewViolation) -> ServiceResult<Self> {
        let missing_ppe = normalize_missing_ppe(&draft.missing_ppe);
        if missing_ppe.is_empty() {
            return Err(ServiceError::Validation(
                "violation must list at least one missing PPE item".to_string(),
            ));
        }

        Ok(Self {
            id,
            employee_id: non_blank(draft.employee_id),
            employee_name: non_blank(draft.employee_name),
            severity: Severity::for_missing(missing_ppe.len()),
            missing_ppe,
            timestamp: draft.timestamp,
            notified: false,
            notified_at: None,
            location: draft.location,
            annotated_image: draft.annotated_image,
        })
    }

    /// Copy of this record under another identity
    pub(crate) fn with_id(&self, id: ViolationId) -> Self {
        Self { id, ..self.clone() }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(missing: &[&str]) -> NewViolation {
        NewViolation {
            employee_id: Some(" E1 ".into()),
            employee_name: Some("".into()),
            missing_ppe: missing.iter().map(|s| s.to_string()).collect(),
            timestamp: Utc::now(),
            location: "Main Camera".into(),
            annotated_image: None,
        }
    }

    #[test]
    fn test_normalize_keeps_first_occurrence_order() {
        let items = normalize_missing_ppe(["Vest", " helmet", "vest", "", "Gloves"]);
        assert_eq!(items, vec!["vest", "helmet", "gloves"]);
    }

    #[test]
    fn test_new_record_is_unnotified() {
        let record = ViolationRecord::new(ViolationId::new(), draft(&["helmet"])).unwrap();
        assert!(!record.notified);
        assert!(record.notified_at.is_none());
        assert_eq!(record.employee_id.as_deref(), Some("E1"));
        assert_eq!(record.employee_name, None);
        assert_eq!(record.severity, Severity::Medium);
    }

    #[test]
    fn test_empty_missing_list_rejected() {
        let err = ViolationRecord::new(ViolationId::new(), draft(&[" ", ""])).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn test_severity_by_count() {
        let record = ViolationRecord::new(ViolationId::new(), draft(&["vest", "gloves"])).unwrap();
        assert_eq!(record.severity, Severity::High);
    }

    #[test]
    fn test_regenerate_is_deterministic() {
        let id = ViolationId::new();
        assert_eq!(id.regenerate(), id.regenerate());
        assert_ne!(id.regenerate(), id);
    }

    #[test]
    fn test_id_parses_from_display() {
        let id = ViolationId::new();
        let parsed: ViolationId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("2026-10-18T10:00:00Z".parse::<ViolationId>().is_err());
    }
}
