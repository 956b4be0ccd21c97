// src/core/enricher/mod.rs

//! Live HTTP/HTTPS header enrichment of stored targets.
//!
//! Runs two sequential waves, ips first and hostnames second. Inside a wave a
//! bounded number of probes run concurrently; workers only return results and
//! the calling task writes the whole wave back in one transaction.

pub mod fetcher;

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::error::StorageResult;
use crate::core::models::{
    DomainKey, EnrichSummary, HeaderEnvelope, KeyColumn, TargetFilter, WaveSummary,
};
use crate::core::store::Store;
use self::fetcher::{HeaderFetcher, Scheme};

/// Concurrent probes per wave when nothing else is configured.
pub const DEFAULT_WORKERS: usize = 40;

pub struct Enricher {
    store: Arc<Store>,
    fetcher: Arc<dyn HeaderFetcher>,
    workers: usize,
}

impl Enricher {
    pub fn new(store: Arc<Store>, fetcher: Arc<dyn HeaderFetcher>, workers: usize) -> Self {
        Self {
            store,
            fetcher,
            workers: workers.max(1),
        }
    }

    /// Fetches headers for every distinct ip, then every distinct hostname,
    /// of `domain`. Only store failures are returned as errors.
    ///
    /// The hostname wave runs after the ip wave is written, so a row that has
    /// both ends up with the hostname's headers.
    ///
    /// # Arguments
    /// * `domain` - The domain whose stored targets are probed.
    ///
    /// # Returns
    /// An `EnrichSummary` with per-wave counts of identifiers probed,
    /// successful http and https responses, and rows updated.
    pub async fn enrich(&self, domain: &DomainKey) -> StorageResult<EnrichSummary> {
        info!(domain = %domain, workers = self.workers, "Grabbing headers from ips and hostnames.");
        let ip_wave = self.run_wave(domain, KeyColumn::Ip).await?;
        let hostname_wave = self.run_wave(domain, KeyColumn::Hostname).await?;
        info!(
            domain = %domain,
            ips = ip_wave.identifiers,
            hostnames = hostname_wave.identifiers,
            "Header enrichment finished."
        );
        Ok(EnrichSummary { ip_wave, hostname_wave })
    }

    async fn run_wave(&self, domain: &DomainKey, column: KeyColumn) -> StorageResult<WaveSummary> {
        let filter = match column {
            KeyColumn::Ip => TargetFilter::IpsOnly,
            KeyColumn::Hostname => TargetFilter::HostnamesOnly,
        };
        let keys: Vec<String> = self
            .store
            .select_targets(domain, filter)?
            .into_iter()
            .filter_map(|t| match column {
                KeyColumn::Ip => t.ip,
                KeyColumn::Hostname => t.hostname,
            })
            .collect();
        debug!(%column, identifiers = keys.len(), "Starting wave.");

        let envelopes = self.fetch_all(keys).await;

        let mut summary = WaveSummary {
            identifiers: envelopes.len(),
            http_ok: envelopes.iter().filter(|e| e.http.is_some()).count(),
            https_ok: envelopes.iter().filter(|e| e.https.is_some()).count(),
            rows_updated: 0,
        };
        summary.rows_updated = self.store.update_headers_batch(domain, column, &envelopes)?;
        info!(
            %column,
            identifiers = summary.identifiers,
            http = summary.http_ok,
            https = summary.https_ok,
            "Wave written."
        );
        Ok(summary)
    }

    /// Probes every key with at most `workers` probes in flight.
    pub async fn fetch_all(&self, keys: Vec<String>) -> Vec<HeaderEnvelope> {
        stream::iter(keys)
            .map(|key| {
                let fetcher = Arc::clone(&self.fetcher);
                async move { grab_headers(fetcher.as_ref(), key).await }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await
    }
}

/// Requests both schemes independently; a failure leaves that side empty.
async fn grab_headers(fetcher: &dyn HeaderFetcher, key: String) -> HeaderEnvelope {
    let (http, https) = tokio::join!(
        fetcher.fetch(Scheme::Http, &key),
        fetcher.fetch(Scheme::Https, &key)
    );
    HeaderEnvelope {
        http: keep_ok(&key, Scheme::Http, http),
        https: keep_ok(&key, Scheme::Https, https),
        key,
    }
}

fn keep_ok(key: &str, scheme: Scheme, result: Result<String, String>) -> Option<String> {
    match result {
        Ok(headers) => Some(headers),
        Err(e) => {
            warn!(identifier = key, %scheme, error = %e, "Could not retrieve headers.");
            None
        }
    }
}
