// src/core/extractor/mod.rs

//! Pulls (hostname, ip) observations out of raw scanner output.

pub mod patterns;
pub mod resolver;

use futures::stream::{self, Stream, StreamExt};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::models::{DomainKey, Observation};
use self::patterns::{find_hostname, find_ipv4, hostname_regex};
use self::resolver::Resolve;

pub struct Extractor {
    domain: DomainKey,
    hostname_re: Regex,
    resolver: Arc<dyn Resolve>,
}

impl Extractor {
    pub fn new(domain: &DomainKey, resolver: Arc<dyn Resolve>) -> Result<Self, regex::Error> {
        Ok(Self {
            domain: domain.clone(),
            hostname_re: hostname_regex(domain.name())?,
            resolver,
        })
    }

    /// Text matching only, no lookups.
    pub fn match_line(&self, line: &str) -> (Option<String>, Option<String>) {
        (find_hostname(&self.hostname_re, line), find_ipv4(line))
    }

    /// Matches one line and fills in the missing side through DNS.
    ///
    /// Returns `None` for lines that carry neither a hostname nor an ip.
    pub async fn extract_line(&self, line: &str) -> Option<Observation> {
        let (mut hostname, mut ip) = self.match_line(line);
        match (&hostname, &ip) {
            (Some(host), None) => ip = self.resolver.forward(host).await,
            (None, Some(addr)) => hostname = self.resolver.reverse(addr).await,
            _ => {}
        }
        Observation::new(hostname, ip)
    }

    /// Lazily walks `reader` line by line. The stream consumes the reader, so
    /// reprocessing means reopening the source.
    ///
    /// Lines are decoded lossily; reading stops at the first I/O error.
    pub fn observations<'a, B>(&'a self, reader: B) -> impl Stream<Item = Observation> + 'a
    where
        B: BufRead + 'a,
    {
        let lines = reader
            .split(b'\n')
            .map_while(Result::ok)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        stream::iter(lines).filter_map(move |line| async move { self.extract_line(&line).await })
    }

    /// Collects every observation in the file at `path`.
    pub async fn extract_file(&self, path: &Path) -> std::io::Result<Vec<Observation>> {
        info!(file = %path.display(), domain = %self.domain, "Parsing file.");
        let reader = BufReader::new(File::open(path)?);
        let found: Vec<Observation> = self.observations(reader).collect().await;
        debug!(file = %path.display(), observations = found.len(), "File parsed.");
        Ok(found)
    }
}
