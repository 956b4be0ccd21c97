// tests/pipeline.rs

use async_trait::async_trait;
use recon_aggregator::core::enricher::fetcher::{HeaderFetcher, Scheme};
use recon_aggregator::core::extractor::resolver::Resolve;
use recon_aggregator::core::models::TargetFilter;
use recon_aggregator::{Aggregation, DomainKey, ExportOptions, Store};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct FixedDns {
    forward: HashMap<&'static str, &'static str>,
    reverse: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl Resolve for FixedDns {
    async fn forward(&self, hostname: &str) -> Option<String> {
        self.forward.get(hostname).map(|s| s.to_string())
    }

    async fn reverse(&self, ip: &str) -> Option<String> {
        self.reverse.get(ip).map(|s| s.to_string())
    }
}

/// Only `9.9.9.9` and `a.example.com` answer, and only over plain HTTP.
struct FixedWeb;

#[async_trait]
impl HeaderFetcher for FixedWeb {
    async fn fetch(&self, scheme: Scheme, target: &str) -> Result<String, String> {
        match (scheme, target) {
            (Scheme::Http, "9.9.9.9") | (Scheme::Http, "a.example.com") => {
                Ok(format!(r#"{{"server":"{target}"}}"#))
            }
            _ => Err("timed out".to_string()),
        }
    }
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn pipeline(db: &TempDir, out: &TempDir) -> (Aggregation, Arc<Store>) {
    let store = Arc::new(Store::new(db.path().join("recon.db")));
    let dns = FixedDns {
        forward: HashMap::from([("b.example.com", "5.6.7.8")]),
        reverse: HashMap::from([("7.7.7.7", "c.example.com")]),
    };
    let aggregation = Aggregation::new(
        Arc::clone(&store),
        DomainKey::new("example.com"),
        out.path(),
        Arc::new(dns),
        Arc::new(FixedWeb),
    )
    .with_workers(4);
    (aggregation, store)
}

#[tokio::test]
async fn ingest_enrich_index_export() {
    let db = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(out.path(), "amass.txt", "a.example.com 9.9.9.9\nb.example.com\nunrelated.org\n");
    write(out.path(), "nmap/scan.gnmap", "Host: 7.7.7.7 ()\tStatus: Up\nHost: 9.9.9.9 (a.example.com)\n");
    write(out.path(), "shots/9.9.9.9_full.png", "png");

    let (aggregation, store) = pipeline(&db, &out);
    let ingest = aggregation
        .aggregate(&[PathBuf::from("amass.txt"), PathBuf::from("missing.txt")], &[PathBuf::from("nmap")])
        .await
        .unwrap();

    assert_eq!(ingest.files, 2);
    assert_eq!(ingest.inserted, 3);
    assert_eq!(ingest.skipped, 1);

    let domain = aggregation.domain().clone();
    let all = store.select_targets(&domain, TargetFilter::All).unwrap();
    let pairs: Vec<(Option<&str>, Option<&str>)> = all
        .iter()
        .map(|t| (t.hostname.as_deref(), t.ip.as_deref()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Some("a.example.com"), Some("9.9.9.9")),
            (Some("b.example.com"), Some("5.6.7.8")),
            (Some("c.example.com"), Some("7.7.7.7")),
        ]
    );

    let enrich = aggregation.headers().await.unwrap();
    assert_eq!(enrich.ip_wave.identifiers, 3);
    assert_eq!(enrich.ip_wave.http_ok, 1);
    assert_eq!(enrich.hostname_wave.identifiers, 3);

    let index = aggregation.build_index().unwrap();
    let entry = &index["9.9.9.9"];
    assert_eq!(entry.hostnames, vec!["a.example.com"]);
    assert!(entry.images.iter().any(|p| p.ends_with("shots/9.9.9.9_full.png")));
    assert!(entry.http_header.contains("a.example.com"));

    let report = aggregation
        .export(ExportOptions { ips: true, hostnames: true, headers: true, index: true })
        .unwrap();
    assert!(report.written.contains(&out.path().join("headers/a.example.com_headers.txt")));
    let ips = fs::read_to_string(out.path().join("aggregated/aggregated_ips.txt")).unwrap();
    assert_eq!(ips, "9.9.9.9\n5.6.7.8\n7.7.7.7");
    assert!(out.path().join("aggregated/index.json").is_file());
}

#[tokio::test]
async fn reingesting_the_same_files_adds_nothing() {
    let db = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(out.path(), "subs.txt", "a.example.com 9.9.9.9\n");
    let (aggregation, store) = pipeline(&db, &out);

    aggregation.aggregate(&[PathBuf::from("subs.txt")], &[]).await.unwrap();
    let second = aggregation.aggregate(&[PathBuf::from("subs.txt")], &[]).await.unwrap();

    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(store.count_targets(aggregation.domain()).unwrap(), 1);
}
