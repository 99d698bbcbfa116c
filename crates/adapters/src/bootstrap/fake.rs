// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{BootstrapChannel, BootstrapError, CommandOutput};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Recorded channel call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    /// `contents` is the local file as read at copy time
    Copy { address: String, remote: String, contents: String },
    Run { address: String, command: String },
    Forget { address: String },
}

/// Scripted reply for commands containing `needle`.
enum Reply {
    Output(CommandOutput),
    Error(BootstrapError),
}

struct FakeChannelState {
    calls: Vec<ChannelCall>,
    /// (needle, queued replies); the last reply repeats
    scripts: Vec<(String, VecDeque<Reply>)>,
    copy_errors: VecDeque<BootstrapError>,
}

/// Fake bootstrap channel for testing.
///
/// Commands with no script succeed with empty output.
#[derive(Clone)]
pub struct FakeChannel {
    inner: Arc<Mutex<FakeChannelState>>,
}

impl Default for FakeChannel {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeChannelState {
                calls: Vec::new(),
                scripts: Vec::new(),
                copy_errors: VecDeque::new(),
            })),
        }
    }
}

fn exit(code: i32) -> CommandOutput {
    CommandOutput { code, stdout: String::new(), stderr: String::new() }
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an exit code for the next command containing `needle`.
    pub fn reply(&self, needle: &str, code: i32) {
        self.push(needle, Reply::Output(exit(code)));
    }

    /// Queue an error for the next command containing `needle`.
    pub fn reply_err(&self, needle: &str, err: BootstrapError) {
        self.push(needle, Reply::Error(err));
    }

    fn push(&self, needle: &str, reply: Reply) {
        let mut state = self.inner.lock();
        if let Some((_, replies)) = state.scripts.iter_mut().find(|(n, _)| n == needle) {
            replies.push_back(reply);
        } else {
            state.scripts.push((needle.to_string(), VecDeque::from([reply])));
        }
    }

    pub fn fail_next_copy(&self, err: BootstrapError) {
        self.inner.lock().copy_errors.push_back(err);
    }

    pub fn calls(&self) -> Vec<ChannelCall> {
        self.inner.lock().calls.clone()
    }

    /// Commands run so far that contain `needle`.
    pub fn commands_matching(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ChannelCall::Run { command, .. } if command.contains(needle)))
            .count()
    }

    pub fn copies(&self) -> Vec<ChannelCall> {
        self.calls().into_iter().filter(|c| matches!(c, ChannelCall::Copy { .. })).collect()
    }
}

#[async_trait]
impl BootstrapChannel for FakeChannel {
    async fn copy_file(&self, address: &str, local: &Path, remote: &str) -> Result<(), BootstrapError> {
        let contents = std::fs::read_to_string(local).unwrap_or_default();
        let mut state = self.inner.lock();
        state.calls.push(ChannelCall::Copy { address: address.to_string(), remote: remote.to_string(), contents });
        match state.copy_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn run_command(
        &self,
        address: &str,
        command: &str,
        _timeout: Duration,
    ) -> Result<CommandOutput, BootstrapError> {
        let mut state = self.inner.lock();
        state.calls.push(ChannelCall::Run { address: address.to_string(), command: command.to_string() });
        let Some((_, replies)) = state.scripts.iter_mut().find(|(needle, _)| command.contains(needle.as_str()))
        else {
            return Ok(exit(0));
        };
        let reply = if replies.len() > 1 { replies.pop_front() } else { None };
        match reply {
            Some(Reply::Output(out)) => Ok(out),
            Some(Reply::Error(err)) => Err(err),
            None => match replies.front() {
                Some(Reply::Output(out)) => Ok(out.clone()),
                Some(Reply::Error(err)) => Err(clone_error(err)),
                None => Ok(exit(0)),
            },
        }
    }

    async fn forget_host(&self, address: &str) -> Result<(), BootstrapError> {
        self.inner.lock().calls.push(ChannelCall::Forget { address: address.to_string() });
        Ok(())
    }
}

fn clone_error(err: &BootstrapError) -> BootstrapError {
    match err {
        BootstrapError::Timeout { what, address, timeout } => {
            BootstrapError::Timeout { what: what.clone(), address: address.clone(), timeout: *timeout }
        }
        BootstrapError::Connect { what, address, detail } => {
            BootstrapError::Connect { what: what.clone(), address: address.clone(), detail: detail.clone() }
        }
        BootstrapError::Failed { what, address, code, stderr } => BootstrapError::Failed {
            what: what.clone(),
            address: address.clone(),
            code: *code,
            stderr: stderr.clone(),
        },
        BootstrapError::Spawn { program, source } => {
            BootstrapError::Spawn { program, source: std::io::Error::new(source.kind(), source.to_string()) }
        }
        BootstrapError::HostKeys(source) => {
            BootstrapError::HostKeys(std::io::Error::new(source.kind(), source.to_string()))
        }
    }
}
