// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sj-daemon: the spotjobs control plane.
//!
//! Holds the singleton lock, persists the tracked node, and runs the control
//! loop that provisions, supervises and destroys the worker node.

pub mod control;
pub mod env;
pub mod lifecycle;
pub mod status;

pub use control::{
    ControlDeps, ControlError, ControlLoop, ControlSettings, DestroyReason, NodeTemplate, TickReport,
    ASSUME_ALIVE_ON_TIMEOUT,
};
pub use env::{ConfigError, ControlConfig};
pub use lifecycle::{Config, InstanceLock, LifecycleError, LockError, LockStatus};
pub use status::{StatusError, StatusReport};
