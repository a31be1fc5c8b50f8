// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Violation lifecycle: ingestion, identity and notification transitions

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use super::{IdSource, MarkOutcome, NewViolation, RandomIds, ViolationId, ViolationRecord, ViolationStore};
use crate::core::{Clock, EventBus, LedgerEvent, SystemClock};
use crate::detection::{AnnotatedImage, DetectionAdapter, DetectionError, DetectionResult};
use crate::employees::EmployeeDirectory;
use crate::error::{ServiceError, ServiceResult};
use crate::violations::normalize_missing_ppe;

/// Outcome of one uploaded image
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub violation: bool,
    pub missing_ppe: Vec<String>,
    pub record: Option<ViolationRecord>,
    pub annotated_image: Option<AnnotatedImage>,
}

/// How a client names a violation: its id, or the detection timestamp older
/// clients used as identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationRef {
    Id(ViolationId),
    Timestamp(DateTime<Utc>),
}

impl FromStr for ViolationRef {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ServiceError::Validation("Missing violation id".to_string()));
        }
        if let Ok(id) = s.parse::<ViolationId>() {
            return Ok(Self::Id(id));
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::Timestamp(ts.with_timezone(&Utc)));
        }
        // zone-less ISO timestamps are taken as UTC
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self::Timestamp(Utc.from_utc_datetime(&naive)))
            .map_err(|_| ServiceError::Validation(format!("invalid violation id: {}", s)))
    }
}

/// Orchestrates detector → ledger and the unnotified → notified transition
pub struct ViolationManager {
    store: Arc<ViolationStore>,
    directory: Arc<EmployeeDirectory>,
    detector: Arc<dyn DetectionAdapter>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
    location: String,
    detection_timeout: Duration,
}

impl ViolationManager {
    pub fn new(
        store: Arc<ViolationStore>,
        directory: Arc<EmployeeDirectory>,
        detector: Arc<dyn DetectionAdapter>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            directory,
            detector,
            events,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
            location: "Main Camera".to_string(),
            detection_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_detection_timeout(mut self, timeout: Duration) -> Self {
        self.detection_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<ViolationStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run detection on `image` and record a violation when one is reported.
    ///
    /// The detector runs before the ledger is touched; a failed or timed out
    /// detection leaves no record behind.
    pub async fn ingest(&self, image: &[u8]) -> ServiceResult<IngestResult> {
        if image.is_empty() {
            return Err(ServiceError::Validation("Empty image upload".to_string()));
        }

        let verdict = self.detect(image).await?;
        if !verdict.has_violation {
            debug!(detector = self.detector.name(), "no violation detected");
            return Ok(IngestResult {
                violation: false,
                missing_ppe: Vec::new(),
                record: None,
                annotated_image: verdict.annotated_image,
            });
        }

        if normalize_missing_ppe(&verdict.missing_ppe).is_empty() {
            return Err(DetectionError::InvalidResponse(
                "violation reported without missing equipment".to_string(),
            )
            .into());
        }

        let employee_name = self.resolve_employee_name(&verdict);
        let draft = NewViolation {
            employee_id: verdict.employee_id.clone(),
            employee_name,
            missing_ppe: verdict.missing_ppe.clone(),
            timestamp: self.clock.now(),
            location: self.location.clone(),
            annotated_image: verdict.annotated_image.as_ref().map(AnnotatedImage::to_wire),
        };
        let record = ViolationRecord::new(self.ids.next_id(), draft)?;
        let record = self.append_with_retry(record)?;

        info!(
            id = %record.id,
            employee = record.employee_id.as_deref().unwrap_or("unknown"),
            missing = %record.missing_ppe.join(", "),
            "Violation recorded"
        );
        self.events.publish(LedgerEvent::ViolationRecorded(record.clone()));

        Ok(IngestResult {
            violation: true,
            missing_ppe: record.missing_ppe.clone(),
            record: Some(record),
            annotated_image: verdict.annotated_image,
        })
    }

    async fn detect(&self, image: &[u8]) -> ServiceResult<DetectionResult> {
        match tokio::time::timeout(self.detection_timeout, self.detector.detect(image)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(detector = self.detector.name(), "detection timed out");
                Err(DetectionError::Timeout(self.detection_timeout.as_millis() as u64).into())
            }
        }
    }

    /// Directory name when the id is registered, else whatever the detector supplied
    fn resolve_employee_name(&self, verdict: &DetectionResult) -> Option<String> {
        verdict
            .employee_id
            .as_deref()
            .and_then(|id| self.directory.find(id).ok())
            .map(|employee| employee.name)
            .or_else(|| verdict.employee_name.clone())
    }

    fn append_with_retry(&self, record: ViolationRecord) -> ServiceResult<ViolationRecord> {
        let collided = match self.store.append(record.clone()) {
            Ok(_) => return Ok(record),
            Err(ServiceError::DuplicateViolation(id)) => id,
            Err(e) => return Err(e),
        };

        let retry = record.with_id(collided.regenerate());
        warn!(%collided, retry = %retry.id, "violation id collision, retrying once");
        match self.store.append(retry.clone()) {
            Ok(_) => Ok(retry),
            Err(ServiceError::DuplicateViolation(again)) => Err(ServiceError::IngestFailed(format!(
                "identity collision on {} and {}",
                collided, again
            ))),
            Err(e) => Err(e),
        }
    }

    /// Mark a violation notified. Re-marking is a successful no-op.
    pub fn acknowledge(&self, id: &ViolationId, at: DateTime<Utc>) -> ServiceResult<MarkOutcome> {
        let outcome = self.store.mark_notified(id, at)?;
        if outcome.transitioned {
            info!(%id, "Violation marked notified");
            self.events
                .publish(LedgerEvent::ViolationNotified(outcome.record.clone()));
        } else {
            debug!(%id, "violation already notified");
        }
        Ok(outcome)
    }

    /// Acknowledge by id or by a timestamp matching exactly one record
    pub fn acknowledge_ref(&self, reference: ViolationRef, at: DateTime<Utc>) -> ServiceResult<MarkOutcome> {
        let id = match reference {
            ViolationRef::Id(id) => id,
            ViolationRef::Timestamp(ts) => {
                let matches = self.store.find_by_timestamp(ts);
                match matches.as_slice() {
                    [] => return Err(ServiceError::ViolationNotFound(ts.to_rfc3339())),
                    [only] => only.id,
                    _ => {
                        return Err(ServiceError::Validation(format!(
                            "timestamp {} matches {} violations, use the violation id",
                            ts.to_rfc3339(),
                            matches.len()
                        )))
                    }
                }
            }
        };
        self.acknowledge(&id, at)
    }

    /// Administrative wipe of the ledger
    pub fn clear(&self) -> ServiceResult<usize> {
        let removed = self.store.clear()?;
        self.events.publish(LedgerEvent::LedgerCleared { removed });
        Ok(removed)
    }

    /// Last `limit` records (all when `None`), oldest first
    pub fn history(&self, limit: Option<usize>) -> Vec<ViolationRecord> {
        let records = self.store.list();
        match limit {
            Some(limit) if limit < records.len() => records[records.len() - limit..].to_vec(),
            _ => records,
        }
    }

    /// Records still awaiting notification
    pub fn pending(&self) -> Vec<ViolationRecord> {
        self.store.list().into_iter().filter(|r| !r.notified).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::employees::NewEmployee;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetector(DetectionResult);

    #[async_trait]
    impl DetectionAdapter for FixedDetector {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn detect(&self, _image: &[u8]) -> Result<DetectionResult, DetectionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl DetectionAdapter for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }

        async fn detect(&self, _image: &[u8]) -> Result<DetectionResult, DetectionError> {
            Err(DetectionError::Request("connection refused".into()))
        }
    }

    struct StalledDetector;

    #[async_trait]
    impl DetectionAdapter for StalledDetector {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn detect(&self, _image: &[u8]) -> Result<DetectionResult, DetectionError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(DetectionResult::compliant())
        }
    }

    /// Always hands out the same id
    struct ConstantIds(ViolationId);

    impl IdSource for ConstantIds {
        fn next_id(&self) -> ViolationId {
            self.0
        }
    }

    struct CountingIds(AtomicUsize);

    impl IdSource for CountingIds {
        fn next_id(&self) -> ViolationId {
            self.0.fetch_add(1, Ordering::SeqCst);
            ViolationId::new()
        }
    }

    fn manager(detector: Arc<dyn DetectionAdapter>) -> (ViolationManager, Arc<EmployeeDirectory>) {
        let directory = Arc::new(EmployeeDirectory::in_memory());
        let manager = ViolationManager::new(
            Arc::new(ViolationStore::in_memory()),
            directory.clone(),
            detector,
            Arc::new(EventBus::default()),
        );
        (manager, directory)
    }

    #[tokio::test]
    async fn test_compliant_image_leaves_store_untouched() {
        let (manager, _) = manager(Arc::new(FixedDetector(DetectionResult::compliant())));
        let result = manager.ingest(b"img").await.unwrap();
        assert!(!result.violation);
        assert!(result.record.is_none());
        assert!(manager.store().is_empty());
    }

    #[tokio::test]
    async fn test_violation_resolves_employee_name() {
        let verdict = DetectionResult::violation(["helmet"]).with_employee("E1", Some("Detector Name".into()));
        let (manager, directory) = manager(Arc::new(FixedDetector(verdict)));
        directory
            .add(NewEmployee {
                employee_id: "E1".into(),
                name: "Alice".into(),
                department: "Ops".into(),
                position: "Rigger".into(),
            })
            .unwrap();

        let result = manager.ingest(b"img").await.unwrap();
        let record = result.record.unwrap();
        assert_eq!(record.employee_name.as_deref(), Some("Alice"));
        assert_eq!(manager.store().get(&record.id).unwrap(), record);
    }

    #[tokio::test]
    async fn test_unknown_employee_keeps_detector_identity() {
        let verdict = DetectionResult::violation(["vest"]).with_employee("E404", Some("Walk-in".into()));
        let (manager, _) = manager(Arc::new(FixedDetector(verdict)));
        let record = manager.ingest(b"img").await.unwrap().record.unwrap();
        assert_eq!(record.employee_id.as_deref(), Some("E404"));
        assert_eq!(record.employee_name.as_deref(), Some("Walk-in"));
    }

    #[tokio::test]
    async fn test_deleted_employee_keeps_recorded_name() {
        let verdict = DetectionResult::violation(["helmet"]).with_employee("E1", None);
        let (manager, directory) = manager(Arc::new(FixedDetector(verdict)));
        directory
            .add(NewEmployee {
                employee_id: "E1".into(),
                name: "Alice".into(),
                department: "Ops".into(),
                position: "Rigger".into(),
            })
            .unwrap();
        let record = manager.ingest(b"img").await.unwrap().record.unwrap();

        directory.remove("E1").unwrap();
        let stored = manager.store().get(&record.id).unwrap();
        assert_eq!(stored.employee_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let ids = Arc::new(CountingIds(AtomicUsize::new(0)));
        let (manager, _) = manager(Arc::new(FixedDetector(DetectionResult::violation(["helmet"]))));
        let manager = manager.with_ids(ids.clone());
        let err = manager.ingest(&[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(ids.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_adapter_failure_records_nothing() {
        let (manager, _) = manager(Arc::new(FailingDetector));
        let err = manager.ingest(b"img").await.unwrap_err();
        assert!(matches!(err, ServiceError::Adapter(DetectionError::Request(_))));
        assert!(manager.store().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_adapter_times_out() {
        let (manager, _) = manager(Arc::new(StalledDetector));
        let manager = manager.with_detection_timeout(Duration::from_millis(50));
        let err = manager.ingest(b"img").await.unwrap_err();
        assert!(matches!(err, ServiceError::Adapter(DetectionError::Timeout(50))));
        assert!(manager.store().is_empty());
    }

    #[tokio::test]
    async fn test_violation_without_items_is_invalid_response() {
        let verdict = DetectionResult {
            has_violation: true,
            ..DetectionResult::compliant()
        };
        let (manager, _) = manager(Arc::new(FixedDetector(verdict)));
        let err = manager.ingest(b"img").await.unwrap_err();
        assert!(matches!(err, ServiceError::Adapter(DetectionError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_id_collision_retries_once_then_fails() {
        let fixed = ViolationId::new();
        let (manager, _) = manager(Arc::new(FixedDetector(DetectionResult::violation(["helmet"]))));
        let manager = manager.with_ids(Arc::new(ConstantIds(fixed)));

        let first = manager.ingest(b"a").await.unwrap().record.unwrap();
        assert_eq!(first.id, fixed);

        let second = manager.ingest(b"b").await.unwrap().record.unwrap();
        assert_eq!(second.id, fixed.regenerate());

        let err = manager.ingest(b"c").await.unwrap_err();
        assert!(matches!(err, ServiceError::IngestFailed(_)));
        assert_eq!(manager.store().len(), 2);
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent_and_publishes_once() {
        let (manager, _) = manager(Arc::new(FixedDetector(DetectionResult::violation(["helmet"]))));
        let t1 = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(t1));
        let manager = manager.with_clock(clock.clone());
        let mut events = manager.events.subscribe();

        let id = manager.ingest(b"img").await.unwrap().record.unwrap().id;
        let first = manager.acknowledge(&id, t1).unwrap();
        let second = manager.acknowledge(&id, t1 + chrono::Duration::hours(1)).unwrap();
        assert!(first.transitioned);
        assert!(!second.transitioned);
        assert_eq!(second.record.notified_at, Some(t1));

        assert!(matches!(events.recv().await.unwrap().payload, LedgerEvent::ViolationRecorded(_)));
        assert!(matches!(events.recv().await.unwrap().payload, LedgerEvent::ViolationNotified(_)));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_acknowledge_by_legacy_timestamp() {
        let detected = Utc.with_ymd_and_hms(2026, 10, 18, 9, 15, 30).unwrap();
        let (manager, _) = manager(Arc::new(FixedDetector(DetectionResult::violation(["helmet"]))));
        let manager = manager.with_clock(Arc::new(ManualClock::new(detected)));
        let id = manager.ingest(b"img").await.unwrap().record.unwrap().id;

        let reference: ViolationRef = "2026-10-18T09:15:30".parse().unwrap();
        let outcome = manager.acknowledge_ref(reference, detected).unwrap();
        assert_eq!(outcome.record.id, id);

        // a second record at the same instant makes the timestamp ambiguous
        manager.ingest(b"img2").await.unwrap();
        let err = manager
            .acknowledge_ref(ViolationRef::Timestamp(detected), detected)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = manager
            .acknowledge_ref("2020-01-01T00:00:00Z".parse().unwrap(), detected)
            .unwrap_err();
        assert!(matches!(err, ServiceError::ViolationNotFound(_)));
    }

    #[test]
    fn test_violation_ref_parsing() {
        let id = ViolationId::new();
        assert_eq!(id.to_string().parse::<ViolationRef>().unwrap(), ViolationRef::Id(id));
        assert!(matches!(
            "2026-10-18T09:15:30.250+02:00".parse::<ViolationRef>().unwrap(),
            ViolationRef::Timestamp(_)
        ));
        assert!("".parse::<ViolationRef>().is_err());
        assert!("yesterday".parse::<ViolationRef>().is_err());
    }

    #[tokio::test]
    async fn test_history_limit_and_pending() {
        let (manager, _) = manager(Arc::new(FixedDetector(DetectionResult::violation(["helmet"]))));
        let mut ids = Vec::new();
        for i in 0..4u8 {
            ids.push(manager.ingest(&[i + 1]).await.unwrap().record.unwrap().id);
        }
        manager.acknowledge(&ids[0], Utc::now()).unwrap();

        let last_two: Vec<_> = manager.history(Some(2)).into_iter().map(|r| r.id).collect();
        assert_eq!(last_two, ids[2..].to_vec());
        assert_eq!(manager.history(None).len(), 4);
        assert_eq!(manager.history(Some(10)).len(), 4);
        assert_eq!(manager.pending().len(), 3);

        assert_eq!(manager.clear().unwrap(), 4);
        assert!(manager.history(None).is_empty());
    }
}
