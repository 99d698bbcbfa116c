// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sjd: spotjobs control plane.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sj_adapters::{SshChannel, WorkerCredentials};
use sj_core::{shutdown_token, SystemClock};
use sj_daemon::{env, status, Config, ControlConfig, ControlDeps, ControlLoop, InstanceLock, LockError};
use sj_storage::{PgStore, StateFile};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sjd", version, about = "Elastic worker node control plane")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop in the foreground
    Run,
    /// Print the tracked node and queue depth as JSON
    Status {
        /// Skip the database query
        #[arg(long)]
        no_queue: bool,
    },
}

fn env_filter() -> EnvFilter {
    std::env::var("SJ_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Log to stderr and to a daily file under the state directory.
fn init_tracing(config: &Config) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(&config.log_dir, "sjd.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    guard
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.prepare()?;
    // Before anything else: a second instance must not touch the node or state
    let lock = InstanceLock::acquire(&config.lock_path)?;
    let _guard = init_tracing(&config);
    tracing::info!(pid = std::process::id(), state_dir = %config.state_dir.display(), "control plane starting");

    let control = ControlConfig::from_env()?;
    tracing::debug!(config = ?control, "loaded configuration");
    let credentials = WorkerCredentials::resolve().context("resolving worker credentials")?;

    let store = PgStore::connect(&control.database_url, 2).await.context("connecting to job store")?;
    store.migrate().await.context("applying schema")?;

    let deps = ControlDeps {
        provider: control.provider()?,
        channel: SshChannel::new(control.ssh_user.clone(), control.ssh_key_path.clone(), config.known_hosts_dir.clone()),
        store,
        clock: SystemClock,
    };
    let mut control_loop = ControlLoop::new(
        deps,
        StateFile::new(&config.state_path),
        credentials,
        &config.staging_path,
        control.template,
        control.settings,
    )?;

    let shutdown = shutdown_token().context("installing signal handlers")?;
    control_loop.run(shutdown).await;

    // The node is left running; the next start resumes it from the state file
    drop(lock);
    tracing::info!("control plane stopped, lock released");
    Ok(())
}

async fn print_status(no_queue: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let kinds = env::node_kinds(|key| std::env::var(key).ok())?;
    let store = if no_queue {
        None
    } else {
        let url = env::database_url()?;
        Some(PgStore::connect(&url, 1).await.context("connecting to job store")?)
    };
    let report = status::collect(&config, store.as_ref(), &kinds).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run => run().await,
        Command::Status { no_queue } => print_status(no_queue).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sjd: {e:#}");
            if matches!(e.downcast_ref::<LockError>(), Some(LockError::Held { .. })) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
