// src/core/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use strum::{AsRefStr, Display, EnumString};

// --- Domain ---

/// A scan scope, kept both as typed by the operator and as the storage key.
///
/// The storage key replaces every `.` with `_`. This is the only place that
/// normalization happens; queries always bind `DomainKey::key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainKey {
    name: String,
    key: String,
}

impl DomainKey {
    pub fn new(domain: &str) -> Self {
        let name = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        let key = name.replace('.', "_");
        Self { name, key }
    }

    /// The dotted domain name, used as the hostname suffix when extracting.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The storage-safe key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// --- Target ---

/// A deduplicated (ip, hostname) observation scoped to one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub http_headers: Option<String>,
    pub https_headers: Option<String>,
}

/// One line's worth of extracted data. At least one side is always present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Observation {
    pub hostname: Option<String>,
    pub ip: Option<String>,
}

impl Observation {
    /// Returns `None` when neither side carries a value.
    pub fn new(hostname: Option<String>, ip: Option<String>) -> Option<Self> {
        if hostname.is_none() && ip.is_none() {
            None
        } else {
            Some(Self { hostname, ip })
        }
    }
}

/// Projection modes for `Store::select_targets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TargetFilter {
    /// Distinct non-null ips; only `ip` is populated on the returned rows.
    IpsOnly,
    /// Distinct non-null hostnames; only `hostname` is populated.
    HostnamesOnly,
    /// Full rows with at least one header column set.
    WithHeaders,
    /// Every distinct row of the domain.
    All,
}

/// The identifier column a header wave is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum KeyColumn {
    Ip,
    Hostname,
}

/// Outcome of a bulk insert. Skipped pairs are duplicates or rows the
/// database refused; neither aborts the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    pub inserted: usize,
    pub skipped: Vec<Observation>,
}

/// Totals of one `aggregate` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: usize,
    pub observations: usize,
    pub inserted: usize,
    pub skipped: usize,
}

// --- Enrichment ---

/// Headers fetched for one identifier during a single wave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEnvelope {
    pub key: String,
    pub http: Option<String>,
    pub https: Option<String>,
}

/// Per-wave counters, mostly for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaveSummary {
    pub identifiers: usize,
    pub http_ok: usize,
    pub https_ok: usize,
    pub rows_updated: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub ip_wave: WaveSummary,
    pub hostname_wave: WaveSummary,
}

// --- Index ---

/// The per-ip merged view of hostnames, headers and screenshot artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIndexEntry {
    pub hostnames: Vec<String>,
    pub http_header: String,
    pub https_header: String,
    pub images: Vec<PathBuf>,
}

impl TargetIndexEntry {
    /// Adds `hostname` unless it is already listed.
    pub fn add_hostname(&mut self, hostname: &str) {
        if !self.hostnames.iter().any(|h| h == hostname) {
            self.hostnames.push(hostname.to_string());
        }
    }
}

/// Keyed by ip. A `BTreeMap` keeps exports stable between runs.
pub type TargetIndex = BTreeMap<String, TargetIndexEntry>;

// --- Export ---

/// Which flat files an export call writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub ips: bool,
    pub hostnames: bool,
    pub headers: bool,
    pub index: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            ips: true,
            hostnames: true,
            headers: false,
            index: false,
        }
    }
}

/// Files written by one export call, in write order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
}
