// src/core/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures of the on-disk store: schema creation, opening the
/// database, or committing a transaction.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot prepare database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An export step failed. Files written before the failure stay in place.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors surfaced by the aggregation pipeline.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("invalid hostname pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
