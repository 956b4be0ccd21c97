// src/core/pipeline.rs

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::core::enricher::fetcher::HeaderFetcher;
use crate::core::enricher::{Enricher, DEFAULT_WORKERS};
use crate::core::error::{AggregateError, ExportError, StorageResult};
use crate::core::exporter::{Exporter, AGGREGATED_DIR, HEADERS_DIR};
use crate::core::extractor::resolver::Resolve;
use crate::core::extractor::Extractor;
use crate::core::indexer::Indexer;
use crate::core::models::{
    DomainKey, EnrichSummary, ExportOptions, ExportReport, IngestSummary, TargetIndex,
};
use crate::core::store::Store;

/// Runs the stages for one domain against one store and output directory.
///
/// Stages are meant to be called in order: `aggregate`, `headers`, then
/// `export` (or `build_index`). Each call opens and releases its own store
/// connections.
pub struct Aggregation {
    store: Arc<Store>,
    domain: DomainKey,
    output_dir: PathBuf,
    resolver: Arc<dyn Resolve>,
    fetcher: Arc<dyn HeaderFetcher>,
    workers: usize,
}

impl Aggregation {
    pub fn new(
        store: Arc<Store>,
        domain: DomainKey,
        output_dir: impl Into<PathBuf>,
        resolver: Arc<dyn Resolve>,
        fetcher: Arc<dyn HeaderFetcher>,
    ) -> Self {
        Self {
            store,
            domain,
            output_dir: output_dir.into(),
            resolver,
            fetcher,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn domain(&self) -> &DomainKey {
        &self.domain
    }

    /// Resolves the input list.
    ///
    /// A file name is looked up under the output directory first, then as
    /// given. Folders are taken relative to the output directory (absolute
    /// paths stay as they are) and walked recursively.
    pub fn discover_inputs(&self, files: &[PathBuf], folders: &[PathBuf]) -> Vec<PathBuf> {
        let mut inputs = Vec::new();
        for name in files {
            let under_output = self.output_dir.join(name);
            if under_output.is_file() {
                inputs.push(under_output);
            } else if name.is_file() {
                inputs.push(name.clone());
            } else {
                warn!(file = %name.display(), "File does not exist, verify scan results.");
            }
        }
        for folder in folders {
            let root = self.output_dir.join(folder);
            for entry in WalkDir::new(&root).sort_by_file_name() {
                match entry {
                    Ok(e) if e.file_type().is_file() => inputs.push(e.into_path()),
                    Ok(_) => {}
                    Err(e) => warn!(folder = %root.display(), error = %e, "Skipping unreadable path."),
                }
            }
        }
        inputs
    }

    /// Extracts observations from every input and stores them.
    ///
    /// Files are handled one after another, each with its own insert
    /// transaction. A file that cannot be opened is skipped with a warning.
    pub async fn aggregate(
        &self,
        files: &[PathBuf],
        folders: &[PathBuf],
    ) -> Result<IngestSummary, AggregateError> {
        self.store.ensure_schema()?;
        self.store.register_domain(&self.domain)?;

        let inputs = self.discover_inputs(files, folders);
        info!(domain = %self.domain, files = inputs.len(), "Parsing all files.");
        let extractor = Extractor::new(&self.domain, Arc::clone(&self.resolver))?;

        let mut summary = IngestSummary::default();
        for path in &inputs {
            let observations = match extractor.extract_file(path).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Could not read file, skipped.");
                    continue;
                }
            };
            let report = self.store.insert_targets(&self.domain, &observations)?;
            summary.files += 1;
            summary.observations += observations.len();
            summary.inserted += report.inserted;
            summary.skipped += report.skipped.len();
        }
        info!(
            domain = %self.domain,
            files = summary.files,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "Aggregation finished."
        );
        Ok(summary)
    }

    /// Enriches stored targets with live response headers.
    pub async fn headers(&self) -> StorageResult<EnrichSummary> {
        self.store.ensure_schema()?;
        Enricher::new(Arc::clone(&self.store), Arc::clone(&self.fetcher), self.workers)
            .enrich(&self.domain)
            .await
    }

    pub fn build_index(&self) -> StorageResult<TargetIndex> {
        Indexer::new(Arc::clone(&self.store), &self.output_dir)
            .exclude_dir(AGGREGATED_DIR)
            .exclude_dir(HEADERS_DIR)
            .build_index(&self.domain)
    }

    pub fn export(&self, options: ExportOptions) -> Result<ExportReport, ExportError> {
        self.store.ensure_schema()?;
        Exporter::new(Arc::clone(&self.store), &self.output_dir).export(&self.domain, options)
    }
}
