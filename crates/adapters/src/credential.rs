// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential resolution for worker nodes.
//!
//! Nodes boot without secrets. Once a node is reachable the control plane
//! resolves the worker's environment from its own host and pushes it as an
//! env file over the bootstrap channel.
//!
//! Resolution order, per variable:
//!
//! ```text
//!   1. the variable in the control plane's environment
//!   2. KEY=VALUE line in the file named by SJ_WORKER_ENV_FILE
//! ```

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Variables forwarded to the worker. The first is required.
pub const WORKER_VARS: &[&str] = &[
    "DATABASE_URL",
    "SJ_EMBEDDER_API_KEY",
    "SJ_VECTOR_API_KEY",
    "SJ_WORKER_JOB_TYPES",
    "SJ_WORKER_POLL_INTERVAL",
    "SJ_WORKER_IDLE_TIMEOUT",
    "SJ_ALLOWED_DOMAINS",
    "SJ_MAX_DOWNLOAD_BYTES",
    "SJ_EXTRACTOR_URL",
    "SJ_EMBEDDER_URL",
    "SJ_VECTOR_URL",
    "SJ_CRAWLER_URL",
    "SJ_CHUNK_WORDS",
    "SJ_CHUNK_OVERLAP",
    "SJ_SERVICE_TIMEOUT",
    "SJ_EMBED_BATCH",
    "SJ_LOG",
];

const REQUIRED: &str = "DATABASE_URL";
const FALLBACK_FILE_VAR: &str = "SJ_WORKER_ENV_FILE";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{0} is not set in the environment or {FALLBACK_FILE_VAR}")]
    Missing(&'static str),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write env file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The resolved worker environment. Values never appear in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WorkerCredentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for WorkerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCredentials").field("keys", &self.vars.keys().collect::<Vec<_>>()).finish()
    }
}

impl WorkerCredentials {
    /// Resolve from the process environment.
    pub fn resolve() -> Result<Self, CredentialError> {
        let fallback = match std::env::var(FALLBACK_FILE_VAR) {
            Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => None,
        };
        Self::resolve_with(|key| std::env::var(key).ok(), fallback.as_deref())
    }

    /// Resolve using `lookup` for the environment and an optional fallback file.
    pub fn resolve_with(
        lookup: impl Fn(&str) -> Option<String>,
        fallback: Option<&Path>,
    ) -> Result<Self, CredentialError> {
        let file_vars = match fallback {
            Some(path) => parse_env_file(
                &std::fs::read_to_string(path)
                    .map_err(|source| CredentialError::Read { path: path.to_path_buf(), source })?,
            ),
            None => BTreeMap::new(),
        };

        let mut vars = BTreeMap::new();
        for &key in WORKER_VARS {
            let value = lookup(key).filter(|v| !v.is_empty()).or_else(|| file_vars.get(key).cloned());
            if let Some(value) = value {
                vars.insert(key.to_string(), value);
            }
        }
        if !vars.contains_key(REQUIRED) {
            return Err(CredentialError::Missing(REQUIRED));
        }
        Ok(Self { vars })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Render as a shell-sourceable env file with single-quoted values.
    pub fn render(&self) -> String {
        self.vars.iter().map(|(k, v)| format!("{}={}\n", k, shell_quote(v))).collect()
    }

    /// Write the env file locally with owner-only permissions.
    ///
    /// The file is removed when the returned guard drops.
    pub fn write_local(&self, path: &Path) -> Result<LocalSecretFile, CredentialError> {
        let write_err = |source| CredentialError::Write { path: path.to_path_buf(), source };
        let mut file =
            OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path).map_err(write_err)?;
        file.write_all(self.render().as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        Ok(LocalSecretFile { path: path.to_path_buf() })
    }
}

/// A local secret file deleted on drop.
#[derive(Debug)]
pub struct LocalSecretFile {
    path: PathBuf,
}

impl LocalSecretFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalSecretFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove local secret file");
        }
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Parse `KEY=VALUE` lines, ignoring blanks, comments and an `export ` prefix.
pub(crate) fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
