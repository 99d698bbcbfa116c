// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boot script and on-node file layout.
//!
//! The boot script only installs packages and signals readiness by writing a
//! marker file. It never carries credentials: those are pushed over the
//! bootstrap channel once the node is reachable, into [`NodeLayout::env_file`].

use std::fmt::Write;

/// Paths and commands for the worker as installed on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLayout {
    /// Written by the boot script as its last step
    pub ready_marker: String,
    /// Worker environment, pushed after boot, mode 0600
    pub env_file: String,
    pub worker_bin: String,
    /// Process name matched by the health check
    pub worker_process: String,
    pub worker_log: String,
}

impl Default for NodeLayout {
    fn default() -> Self {
        Self {
            ready_marker: "/var/lib/spotjobs/ready".to_string(),
            env_file: "/etc/spotjobs/worker.env".to_string(),
            worker_bin: "/usr/local/bin/sj-worker".to_string(),
            worker_process: "sj-worker".to_string(),
            worker_log: "/var/log/spotjobs/worker.log".to_string(),
        }
    }
}

impl NodeLayout {
    /// Exits 0 once the boot script has finished.
    pub fn readiness_check(&self) -> String {
        format!("test -f {}", self.ready_marker)
    }

    /// Exits 0 while a worker process is running.
    pub fn liveness_check(&self) -> String {
        format!("pgrep -x {}", self.worker_process)
    }

    /// Start the worker detached from the ssh session, reading the pushed env file.
    pub fn start_worker(&self) -> String {
        format!(
            "set -a && . {env} && set +a && nohup {bin} >> {log} 2>&1 < /dev/null &",
            env = self.env_file,
            bin = self.worker_bin,
            log = self.worker_log,
        )
    }
}

/// Builder for the node's first-boot script.
#[derive(Debug, Clone, Default)]
pub struct BootScript {
    layout: NodeLayout,
    packages: Vec<String>,
}

impl BootScript {
    pub fn new(layout: NodeLayout) -> Self {
        Self { layout, packages: Vec::new() }
    }

    sj_core::setters! {
        set { packages: Vec<String> }
    }

    pub fn render(&self) -> String {
        let layout = &self.layout;
        let mut script = String::from("#!/bin/bash\nset -euo pipefail\n");
        let dir = |path: &str| path.rsplit_once('/').map(|(d, _)| d.to_string()).unwrap_or_default();
        let _ = writeln!(
            script,
            "mkdir -p {} {} {}",
            dir(&layout.ready_marker),
            dir(&layout.env_file),
            dir(&layout.worker_log)
        );
        let _ = writeln!(script, "chmod 700 {}", dir(&layout.env_file));
        if !self.packages.is_empty() {
            script.push_str("export DEBIAN_FRONTEND=noninteractive\n");
            script.push_str("apt-get update -q\n");
            let _ = writeln!(script, "apt-get install -y -q {}", self.packages.join(" "));
        }
        let _ = writeln!(script, "touch {}", layout.ready_marker);
        script
    }
}

#[cfg(test)]
#[path = "boot_tests.rs"]
mod tests;
