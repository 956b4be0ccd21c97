// src/config.rs

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::enricher::fetcher::DEFAULT_USER_AGENT;
use crate::core::enricher::DEFAULT_WORKERS;

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "recon-aggregator", env!("CARGO_PKG_NAME"))
}

/// Per-user data directory; falls back to `./.data` when no home is known.
pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding every domain's targets.
    pub database: PathBuf,
    /// Where scanners deposit output and where exports are written.
    pub output_dir: PathBuf,
    /// Concurrent header probes per wave.
    pub workers: usize,
    pub http_timeout_ms: u64,
    /// Deadline for a single forward or reverse lookup.
    pub dns_timeout_ms: u64,
    pub user_agent: String,
    /// Skip DNS completion of half pairs.
    pub no_dns: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: get_data_dir().join("recon.db"),
            output_dir: PathBuf::from("output"),
            workers: DEFAULT_WORKERS,
            http_timeout_ms: 1_000,
            dns_timeout_ms: 3_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            no_dns: false,
        }
    }
}

impl Config {
    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }
}
