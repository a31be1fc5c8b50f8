// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Violation ledger, lifecycle and statistics

mod lifecycle;
mod record;
mod stats;
mod store;

pub use lifecycle::*;
pub use record::*;
pub use stats::*;
pub use store::*;
