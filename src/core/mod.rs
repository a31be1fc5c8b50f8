// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Core module - composition root, clock and event bus

mod clock;
mod engine;
mod event_bus;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Engine;
pub use event_bus::{Event, EventBus, LedgerEvent};
