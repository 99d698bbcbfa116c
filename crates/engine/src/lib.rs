// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sj-engine: Data plane worker that drains the job queue on a node

pub mod env;
pub mod handler;
mod worker;

pub use env::{ConfigError, WorkerConfig};
pub use handler::{normalize_date, HandlerError, JobHandler, Pipelines, ProgressSink};
pub use worker::{JobOutcome, WorkerExit, WorkerLoop};
