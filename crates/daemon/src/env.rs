// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the control plane.

use std::path::PathBuf;
use std::time::Duration;

use sj_adapters::{DigitalOceanProvider, NodeLayout, ProviderError, DEFAULT_API_URL};
use sj_core::{parse_duration, parse_kinds, JobKind};
use thiserror::Error;

use crate::control::{ControlSettings, NodeTemplate};
use crate::lifecycle::LifecycleError;

/// Resolve state directory: SJ_STATE_DIR > XDG_STATE_HOME/spotjobs > ~/.local/state/spotjobs
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SJ_STATE_DIR") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("spotjobs"));
        }
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/spotjobs"))
}

/// Invalid or missing control plane configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
}

/// Everything `sjd run` reads from the environment.
#[derive(Clone)]
pub struct ControlConfig {
    pub provider_token: String,
    pub provider_api_url: String,
    pub database_url: String,
    pub ssh_key_path: PathBuf,
    pub ssh_user: String,
    pub template: NodeTemplate,
    pub settings: ControlSettings,
}

impl std::fmt::Debug for ControlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlConfig")
            .field("provider_api_url", &self.provider_api_url)
            .field("ssh_key_path", &self.ssh_key_path)
            .field("ssh_user", &self.ssh_user)
            .field("template", &self.template)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ControlConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let defaults = ControlSettings::default();

        let kinds = node_kinds(&lookup)?;

        let settings = ControlSettings {
            kinds,
            poll_interval: duration(&get, "SJ_POLL_INTERVAL", defaults.poll_interval)?,
            idle_timeout: duration(&get, "SJ_IDLE_TIMEOUT", defaults.idle_timeout)?,
            max_runtime: duration(&get, "SJ_MAX_RUNTIME", defaults.max_runtime)?,
            stuck_threshold: duration(&get, "SJ_STUCK_THRESHOLD", defaults.stuck_threshold)?,
            startup_timeout: duration(&get, "SJ_STARTUP_TIMEOUT", defaults.startup_timeout)?,
            boot_poll_interval: duration(&get, "SJ_BOOT_POLL_INTERVAL", defaults.boot_poll_interval)?,
            health_timeout: duration(&get, "SJ_HEALTH_TIMEOUT", defaults.health_timeout)?,
            health_retries: number(&get, "SJ_HEALTH_RETRIES", defaults.health_retries)?,
            command_timeout: duration(&get, "SJ_COMMAND_TIMEOUT", defaults.command_timeout)?,
            retry: defaults.retry,
        };

        let template = NodeTemplate {
            region: or("SJ_NODE_REGION", "tor1"),
            size: or("SJ_NODE_SIZE", "gpu-h100x1-80gb"),
            image: or("SJ_NODE_IMAGE", "gpu-h100x1-base"),
            tag: or("SJ_NODE_TAG", "spotjobs-worker"),
            ssh_keys: get("SJ_SSH_KEY_IDS")
                .map(|list| list.split(',').map(str::trim).filter(|k| !k.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
            packages: get("SJ_NODE_PACKAGES")
                .map(|list| list.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            layout: NodeLayout::default(),
        };

        let ssh_key_path = match get("SJ_SSH_KEY_PATH") {
            Some(path) => PathBuf::from(path),
            None => dirs::home_dir().map(|h| h.join(".ssh/id_ed25519")).ok_or(ConfigError::Missing("SJ_SSH_KEY_PATH"))?,
        };

        Ok(Self {
            provider_token: get("SJ_PROVIDER_TOKEN").ok_or(ConfigError::Missing("SJ_PROVIDER_TOKEN"))?,
            provider_api_url: or("SJ_PROVIDER_API_URL", DEFAULT_API_URL),
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            ssh_key_path,
            ssh_user: or("SJ_SSH_USER", "root"),
            template,
            settings,
        })
    }

    pub fn provider(&self) -> Result<DigitalOceanProvider, ProviderError> {
        DigitalOceanProvider::new(self.provider_api_url.clone(), self.provider_token.clone())
    }
}

/// Job kinds that need the worker node (`SJ_NODE_JOB_TYPES`).
pub fn node_kinds(lookup: impl Fn(&str) -> Option<String>) -> Result<Vec<JobKind>, ConfigError> {
    let Some(list) = lookup("SJ_NODE_JOB_TYPES").filter(|v| !v.trim().is_empty()) else {
        return Ok(ControlSettings::default().kinds);
    };
    let kinds = parse_kinds(&list)
        .map_err(|e| ConfigError::Invalid { var: "SJ_NODE_JOB_TYPES", value: list.clone(), reason: e.to_string() })?;
    if kinds.is_empty() {
        return Err(ConfigError::Invalid {
            var: "SJ_NODE_JOB_TYPES",
            value: list,
            reason: "no job types listed".to_string(),
        });
    }
    Ok(kinds)
}

/// Database URL for `sjd status`, which needs nothing else.
pub fn database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()).ok_or(ConfigError::Missing("DATABASE_URL"))
}

fn duration(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match get(var) {
        Some(value) => parse_duration(&value).map_err(|reason| ConfigError::Invalid { var, value, reason }),
        None => Ok(default),
    }
}

fn number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid { var, reason: e.to_string(), value }),
        None => Ok(default),
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
