// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sj-core: Domain types shared by the spotjobs control plane and worker

pub mod macros;

pub mod chunk;
pub mod clock;
pub mod duration;
pub mod job;
pub mod node;
pub mod retry;
pub mod shutdown;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[doc(hidden)]
pub use uuid;

pub use chunk::{chunk_id, Chunk, Chunker, EmbeddedChunk};
pub use clock::{Clock, FakeClock, SystemClock};
pub use duration::{format_duration, parse_duration};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{
    parse_kinds, Job, JobCounters, JobId, JobKind, JobStatus, NewJob, TransitionError,
    UnknownJobKind,
};
pub use node::{DestroyReason, NodeId, NodeInfo, NodePhase, NodeSpec, NodeStatus};
pub use retry::{retry_transient, RetryPolicy, Transient};
pub use shutdown::shutdown_token;
pub use worker::WorkerId;
