// src/lib.rs

//! Aggregates hostnames and IPs found in scanner output into a per-domain
//! store, enriches them with live HTTP/HTTPS headers, and exports flat files
//! plus a per-ip index of related screenshots.

pub mod config;
pub mod core;

pub use crate::core::error::{AggregateError, ExportError, StorageError};
pub use crate::core::models::{DomainKey, ExportOptions, Target, TargetIndex, TargetIndexEntry};
pub use crate::core::pipeline::Aggregation;
pub use crate::core::store::Store;
