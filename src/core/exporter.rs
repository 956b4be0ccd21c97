// src/core/exporter.rs

//! Flattens stored targets into plain files under the output directory.
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! reader never sees a half-written file. The first failing step aborts the
//! export; files already written are left alone.

use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::core::error::ExportError;
use crate::core::indexer::Indexer;
use crate::core::models::{DomainKey, ExportOptions, ExportReport, TargetFilter, TargetIndex};
use crate::core::store::Store;

pub const AGGREGATED_DIR: &str = "aggregated";
pub const HEADERS_DIR: &str = "headers";
pub const IPS_FILE: &str = "aggregated_ips.txt";
pub const HOSTNAMES_FILE: &str = "aggregated_hostnames.txt";
pub const PROTOCOL_HOSTNAMES_FILE: &str = "aggregated_protocol_hostnames.txt";
pub const INDEX_FILE: &str = "index.json";

/// One `headers/<hostname>_headers.txt` document.
#[derive(Debug, Serialize)]
struct HeaderDump<'a> {
    #[serde(rename = "Ip")]
    ip: Option<&'a str>,
    #[serde(rename = "Hostname")]
    hostname: &'a str,
    #[serde(rename = "Http")]
    http: Option<&'a str>,
    #[serde(rename = "Https")]
    https: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct IndexDocument<'a> {
    domain: &'a str,
    generated_at: String,
    targets: &'a TargetIndex,
}

pub struct Exporter {
    store: Arc<Store>,
    output_dir: PathBuf,
}

impl Exporter {
    pub fn new(store: Arc<Store>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            output_dir: output_dir.into(),
        }
    }

    pub fn aggregated_path(&self, file: &str) -> PathBuf {
        self.output_dir.join(AGGREGATED_DIR).join(file)
    }

    pub fn headers_path(&self, hostname: &str) -> PathBuf {
        let safe: String = hostname
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.output_dir
            .join(HEADERS_DIR)
            .join(format!("{safe}_headers.txt"))
    }

    /// Writes the selected lists for `domain` under the output directory.
    ///
    /// Every file is written to a temporary sibling and renamed into place,
    /// so a reader never sees a partial list. Lists are newline-joined with
    /// no trailing newline.
    ///
    /// # Arguments
    /// * `domain` - The domain whose stored targets are exported.
    /// * `options` - Which outputs to produce (ips, hostnames, header dumps,
    ///   index).
    ///
    /// # Returns
    /// An `ExportReport` listing every file written. On failure the error
    /// names the file; files written before it stay in place.
    pub fn export(&self, domain: &DomainKey, options: ExportOptions) -> Result<ExportReport, ExportError> {
        let result = self.run(domain, options);
        match &result {
            Ok(report) => info!(domain = %domain, files = report.written.len(), "Export finished."),
            Err(e) => error!(domain = %domain, error = %e, "Failed to write to files in output directory."),
        }
        result
    }

    fn run(&self, domain: &DomainKey, options: ExportOptions) -> Result<ExportReport, ExportError> {
        let mut report = ExportReport::default();

        if options.ips {
            let ips: Vec<String> = self
                .store
                .select_targets(domain, TargetFilter::IpsOnly)?
                .into_iter()
                .filter_map(|t| t.ip)
                .collect();
            let path = self.aggregated_path(IPS_FILE);
            write_atomic(&path, ips.join("\n").as_bytes())?;
            report.written.push(path);
        }

        if options.hostnames {
            let hostnames: Vec<String> = self
                .store
                .select_targets(domain, TargetFilter::HostnamesOnly)?
                .into_iter()
                .filter_map(|t| t.hostname)
                .collect();

            let path = self.aggregated_path(HOSTNAMES_FILE);
            write_atomic(&path, hostnames.join("\n").as_bytes())?;
            report.written.push(path);

            let prefixed = hostnames
                .iter()
                .map(|h| format!("https://{h}\nhttp://{h}"))
                .collect::<Vec<_>>()
                .join("\n");
            let path = self.aggregated_path(PROTOCOL_HOSTNAMES_FILE);
            write_atomic(&path, prefixed.as_bytes())?;
            report.written.push(path);
        }

        if options.headers {
            for target in self.store.select_targets(domain, TargetFilter::WithHeaders)? {
                let Some(hostname) = target.hostname.as_deref() else {
                    debug!(ip = ?target.ip, "No hostname, header dump skipped.");
                    continue;
                };
                let dump = HeaderDump {
                    ip: target.ip.as_deref(),
                    hostname,
                    http: target.http_headers.as_deref(),
                    https: target.https_headers.as_deref(),
                };
                let path = self.headers_path(hostname);
                let body = serde_json::to_string_pretty(&dump)
                    .map_err(|source| ExportError::Serialize { path: path.clone(), source })?;
                write_atomic(&path, body.as_bytes())?;
                report.written.push(path);
            }
        }

        if options.index {
            let index = Indexer::new(Arc::clone(&self.store), &self.output_dir)
                .exclude_dir(AGGREGATED_DIR)
                .exclude_dir(HEADERS_DIR)
                .build_index(domain)?;
            let path = self.aggregated_path(INDEX_FILE);
            let document = IndexDocument {
                domain: domain.name(),
                generated_at: Utc::now().to_rfc3339(),
                targets: &index,
            };
            let body = serde_json::to_string_pretty(&document)
                .map_err(|source| ExportError::Serialize { path: path.clone(), source })?;
            write_atomic(&path, body.as_bytes())?;
            report.written.push(path);
        }

        Ok(report)
    }
}

/// Writes `contents` to a temporary file next to `path`, then renames it.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let wrap = |source: std::io::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(wrap)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(wrap)?;
    tmp.write_all(contents).map_err(wrap)?;
    tmp.flush().map_err(wrap)?;
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    debug!(file = %path.display(), bytes = contents.len(), "File written.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{KeyColumn, Observation};
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn seeded(dir: &TempDir) -> (Arc<Store>, DomainKey) {
        let store = Store::new(dir.path().join("recon.db"));
        store.ensure_schema().unwrap();
        let domain = DomainKey::new("example.com");
        store.register_domain(&domain).unwrap();
        let pairs = [
            ("a.example.com", "1.1.1.1"),
            ("b.example.com", "1.1.1.1"),
            ("c.example.com", "2.2.2.2"),
        ];
        let observations: Vec<Observation> = pairs
            .iter()
            .filter_map(|(h, i)| Observation::new(Some(h.to_string()), Some(i.to_string())))
            .collect();
        store.insert_targets(&domain, &observations).unwrap();
        (Arc::new(store), domain)
    }

    #[test]
    fn default_options_write_flat_lists() {
        let db = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let (store, domain) = seeded(&db);
        let exporter = Exporter::new(store, out.path());

        let report = exporter.export(&domain, ExportOptions::default()).unwrap();

        assert_eq!(report.written.len(), 3);
        let ips = fs::read_to_string(out.path().join("aggregated/aggregated_ips.txt")).unwrap();
        assert_eq!(ips, "1.1.1.1\n2.2.2.2");
        let hosts = fs::read_to_string(out.path().join("aggregated/aggregated_hostnames.txt")).unwrap();
        assert_eq!(hosts, "a.example.com\nb.example.com\nc.example.com");
        let prefixed =
            fs::read_to_string(out.path().join("aggregated/aggregated_protocol_hostnames.txt")).unwrap();
        assert!(prefixed.starts_with("https://a.example.com\nhttp://a.example.com\nhttps://b.example.com"));
        assert_eq!(prefixed.lines().count(), 6);
    }

    #[test]
    fn header_dumps_use_fixed_keys() {
        let db = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let (store, domain) = seeded(&db);
        store
            .update_headers(&domain, KeyColumn::Hostname, "c.example.com", Some("X"), Some("Y"))
            .unwrap();
        let exporter = Exporter::new(store, out.path());
        let options = ExportOptions { ips: false, hostnames: false, headers: true, index: false };

        let report = exporter.export(&domain, options).unwrap();

        assert_eq!(report.written, vec![out.path().join("headers/c.example.com_headers.txt")]);
        let dump: Value =
            serde_json::from_str(&fs::read_to_string(&report.written[0]).unwrap()).unwrap();
        assert_eq!(dump["Ip"], "2.2.2.2");
        assert_eq!(dump["Hostname"], "c.example.com");
        assert_eq!(dump["Http"], "X");
        assert_eq!(dump["Https"], "Y");
    }

    #[test]
    fn index_file_is_keyed_by_ip() {
        let db = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let (store, domain) = seeded(&db);
        let exporter = Exporter::new(store, out.path());
        let options = ExportOptions { ips: false, hostnames: false, headers: false, index: true };

        exporter.export(&domain, options).unwrap();

        let doc: Value = serde_json::from_str(
            &fs::read_to_string(out.path().join("aggregated/index.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(doc["domain"], "example.com");
        assert_eq!(doc["targets"]["1.1.1.1"]["hostnames"].as_array().unwrap().len(), 2);
        assert_eq!(doc["targets"]["2.2.2.2"]["http_header"], "");
    }

    #[test]
    fn unwritable_target_reports_the_failing_file() {
        let db = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let (store, domain) = seeded(&db);
        // A plain file where the `aggregated` directory should be.
        fs::write(out.path().join(AGGREGATED_DIR), b"").unwrap();
        let exporter = Exporter::new(store, out.path());

        let err = exporter.export(&domain, ExportOptions::default()).unwrap_err();

        match err {
            ExportError::Write { path, .. } => assert!(path.ends_with("aggregated/aggregated_ips.txt")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hostnames_cannot_escape_the_headers_dir() {
        let out = TempDir::new().unwrap();
        let exporter = Exporter::new(Arc::new(Store::new(out.path().join("x.db"))), out.path());
        let path = exporter.headers_path("../evil");
        assert!(path.starts_with(out.path().join(HEADERS_DIR)));
        assert!(path.ends_with(".._evil_headers.txt"));
    }
}
