// src/core/mod.rs

// The `core` module holds the aggregation engine. Each stage of the pipeline
// lives in its own sub-module and receives the store handle explicitly.

/// Data structures shared by every stage: domains, targets, index entries.
pub mod models;

/// Typed errors for storage and export failures.
pub mod error;

/// The SQLite table of unique (ip, hostname) pairs per domain.
pub mod store;

/// Hostname and IPv4 extraction from raw scanner output, with DNS completion.
pub mod extractor;

/// Concurrent HTTP/HTTPS header retrieval written back to the store.
pub mod enricher;

/// Per-ip index joining stored targets with screenshot files on disk.
pub mod indexer;

/// Flat file exports of the store and the index.
pub mod exporter;

/// Orchestration of the stages for one domain.
pub mod pipeline;
