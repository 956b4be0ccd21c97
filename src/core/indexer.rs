// src/core/indexer.rs

//! Builds the per-ip view that joins stored targets with screenshot files
//! found under a search root. The indexer only reads the filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::error::StorageResult;
use crate::core::models::{DomainKey, TargetFilter, TargetIndex};
use crate::core::store::Store;

pub struct Indexer {
    store: Arc<Store>,
    root: PathBuf,
    excluded: Vec<PathBuf>,
}

impl Indexer {
    pub fn new(store: Arc<Store>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            store,
            root,
            excluded: Vec::new(),
        }
    }

    /// Skips a directory, relative to the search root, while collecting files.
    pub fn exclude_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.excluded.push(self.root.join(dir));
        self
    }

    /// Every regular file under the root, as absolute paths.
    fn collect_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.excluded.iter().any(|x| e.path() == x.as_path()))
            .filter_map(|entry| match entry {
                Ok(e) if e.file_type().is_file() => Some(e.into_path()),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable path.");
                    None
                }
            })
            .collect()
    }

    fn matching<'a>(&self, files: &'a [PathBuf], needle: &'a str) -> impl Iterator<Item = &'a PathBuf> + 'a {
        let root = self.root.clone();
        files.iter().filter(move |path| {
            path.strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .contains(needle)
        })
    }

    /// Builds the ip-keyed index for `domain`.
    ///
    /// Rows with headers are seeded first, together with every file whose
    /// path under the root contains the row's ip or hostname. Then every
    /// distinct row adds its hostname to its ip's entry. Rows without an ip
    /// never appear.
    ///
    /// # Arguments
    /// * `domain` - The domain whose stored targets are indexed.
    ///
    /// # Returns
    /// A `TargetIndex` ordered by ip. Each entry holds the hostnames seen for
    /// that ip, its last stored headers (empty when none) and the absolute
    /// paths of matching artifact files.
    pub fn build_index(&self, domain: &DomainKey) -> StorageResult<TargetIndex> {
        let files = self.collect_files();
        debug!(root = %self.root.display(), files = files.len(), "Artifact search finished.");
        let mut index = TargetIndex::new();

        for target in self.store.select_targets(domain, TargetFilter::WithHeaders)? {
            let Some(ip) = target.ip.as_deref() else {
                continue;
            };
            let entry = index.entry(ip.to_string()).or_default();
            if let Some(hostname) = target.hostname.as_deref() {
                entry.add_hostname(hostname);
            }
            entry.http_header = target.http_headers.clone().unwrap_or_default();
            entry.https_header = target.https_headers.clone().unwrap_or_default();

            let by_ip = self.matching(&files, ip);
            let by_host = target
                .hostname
                .as_deref()
                .into_iter()
                .flat_map(|h| self.matching(&files, h));
            for path in by_ip.chain(by_host) {
                if !entry.images.contains(path) {
                    entry.images.push(path.clone());
                }
            }
        }

        for target in self.store.select_targets(domain, TargetFilter::All)? {
            let Some(ip) = target.ip else {
                continue;
            };
            let entry = index.entry(ip).or_default();
            if let Some(hostname) = target.hostname.as_deref() {
                entry.add_hostname(hostname);
            }
        }

        info!(domain = %domain, entries = index.len(), "Index built.");
        Ok(index)
    }
}
