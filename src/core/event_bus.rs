// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event bus for ledger change notifications

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::violations::ViolationRecord;

/// Ledger changes fanned out to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    ViolationRecorded(ViolationRecord),
    ViolationNotified(ViolationRecord),
    LedgerCleared { removed: usize },
}

/// Generic event wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: LedgerEvent,
}

/// Broadcast pub/sub. Publishing never blocks; slow subscribers lag and drop.
pub struct EventBus {
    event_tx: broadcast::Sender<Event>,
    event_counter: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            event_tx,
            event_counter: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, payload: LedgerEvent) {
        let id = self.event_counter.fetch_add(1, Ordering::Relaxed);
        let event = Event {
            id,
            timestamp: Utc::now(),
            payload,
        };
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(LedgerEvent::LedgerCleared { removed: 3 });
        bus.publish(LedgerEvent::LedgerCleared { removed: 0 });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(second.id, 1);
        assert_eq!(first.payload, LedgerEvent::LedgerCleared { removed: 3 });
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(LedgerEvent::LedgerCleared { removed: 1 });

        // late subscribers only see later events
        let mut rx = bus.subscribe();
        bus.publish(LedgerEvent::LedgerCleared { removed: 2 });
        let event = rx.try_recv().unwrap();
        assert_eq!(event.id, 1);
        assert_eq!(event.payload, LedgerEvent::LedgerCleared { removed: 2 });
    }
}
