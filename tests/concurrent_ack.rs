// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use ppewatch::core::{EventBus, LedgerEvent, SystemClock};
use ppewatch::detection::{DetectionAdapter, DetectionError, DetectionResult};
use ppewatch::{Config, Database, EmployeeDirectory, Engine, ViolationManager, ViolationStore};
use serde_json::{json, Value};

struct AlwaysMissingVest;

#[async_trait]
impl DetectionAdapter for AlwaysMissingVest {
    fn name(&self) -> &str {
        "always-missing-vest"
    }

    async fn detect(&self, _image: &[u8]) -> Result<DetectionResult, DetectionError> {
        Ok(DetectionResult::violation(["vest"]))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_acknowledgments_transition_once() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = Arc::new(ViolationStore::with_database(db).unwrap());
    let events = Arc::new(EventBus::default());
    let manager = Arc::new(ViolationManager::new(
        store.clone(),
        Arc::new(EmployeeDirectory::in_memory()),
        Arc::new(AlwaysMissingVest),
        events.clone(),
    ));
    let mut rx = events.subscribe();

    let id = manager.ingest(b"frame").await.unwrap().record.unwrap().id;

    const N: usize = 32;
    let tasks = (0..N).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.acknowledge(&id, Utc::now()) })
    });
    let outcomes: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(outcomes.len(), N);
    assert_eq!(outcomes.iter().filter(|o| o.transitioned).count(), 1);
    let first_at = store.get(&id).unwrap().notified_at;
    assert!(outcomes.iter().all(|o| o.record.notified_at == first_at));

    // one recorded event, one notified event, nothing else
    assert!(matches!(rx.recv().await.unwrap().payload, LedgerEvent::ViolationRecorded(_)));
    assert!(matches!(rx.recv().await.unwrap().payload, LedgerEvent::ViolationNotified(_)));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_http_acknowledgments_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default().with_data_dir(dir.path().to_path_buf());
    let engine =
        Engine::with_detector(config, Arc::new(AlwaysMissingVest), Arc::new(SystemClock)).unwrap();
    let id = engine.manager().ingest(b"frame").await.unwrap().record.unwrap().id;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = engine.router();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = reqwest::Client::new();
    let url = format!("http://{}/api/mark_notified", addr);
    let requests = (0..16).map(|_| {
        let client = client.clone();
        let url = url.clone();
        async move {
            let resp = client
                .post(&url)
                .json(&json!({"violation_id": id.to_string()}))
                .send()
                .await
                .unwrap();
            let status = resp.status().as_u16();
            let body: Value = resp.json().await.unwrap();
            (status, body)
        }
    });
    let responses = join_all(requests).await;

    assert!(responses.iter().all(|(status, body)| *status == 200 && body["success"] == true));
    assert_eq!(responses.iter().filter(|(_, body)| body["changed"] == true).count(), 1);

    let record = engine.manager().store().get(&id).unwrap();
    assert!(record.notified);
}
