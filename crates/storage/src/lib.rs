// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sj-storage: Job queue store and durable control-plane state

mod control_state;
#[cfg(any(test, feature = "test-support"))]
mod memory;
mod postgres;
mod schema;
mod store;

pub use control_state::{ControlState, StateError, StateFile, CURRENT_STATE_VERSION};
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use schema::SCHEMA;
pub use store::{stuck_message, IngestRecord, JobStore, QueueDepth, RecordStore, StoreError};
