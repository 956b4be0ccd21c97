// src/core/extractor/resolver.rs

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Forward and reverse name resolution used to complete half-observed pairs.
///
/// Every failure, timeout included, is reported as `None`.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn forward(&self, hostname: &str) -> Option<String>;
    async fn reverse(&self, ip: &str) -> Option<String>;
}

/// Resolver backed by `hickory-resolver`, with a hard deadline per lookup.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    deadline: Duration,
}

impl DnsResolver {
    /// Uses the host's resolver configuration (`/etc/resolv.conf`, hosts
    /// file). Falls back to the library defaults when it cannot be read.
    pub fn new(deadline: Duration) -> Self {
        match read_system_conf() {
            Ok((config, opts)) => Self::with_config(config, opts, deadline),
            Err(e) => {
                warn!(error = %e, "Could not read system DNS configuration, using defaults.");
                Self::with_config(ResolverConfig::default(), ResolverOpts::default(), deadline)
            }
        }
    }

    /// Builds a resolver on an explicit configuration. `deadline` bounds each
    /// lookup and replaces the per-query timeout in `opts`.
    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts, deadline: Duration) -> Self {
        opts.timeout = deadline;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            deadline,
        }
    }
}

#[async_trait]
impl Resolve for DnsResolver {
    async fn forward(&self, hostname: &str) -> Option<String> {
        match timeout(self.deadline, self.resolver.lookup_ip(hostname)).await {
            Ok(Ok(lookup)) => {
                let ip = lookup.iter().find(IpAddr::is_ipv4).map(|ip| ip.to_string());
                debug!(hostname, ip = ?ip, "Forward lookup finished.");
                ip
            }
            Ok(Err(e)) => {
                debug!(hostname, error = %e, "Forward lookup failed.");
                None
            }
            Err(_) => {
                debug!(hostname, "Forward lookup timed out.");
                None
            }
        }
    }

    async fn reverse(&self, ip: &str) -> Option<String> {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            debug!(ip, "Not a parseable address, skipping reverse lookup.");
            return None;
        };
        match timeout(self.deadline, self.resolver.reverse_lookup(addr)).await {
            Ok(Ok(lookup)) => {
                let name = lookup
                    .iter()
                    .next()
                    .map(|ptr| ptr.to_string().trim_end_matches('.').to_ascii_lowercase());
                debug!(ip, hostname = ?name, "Reverse lookup finished.");
                name
            }
            Ok(Err(e)) => {
                debug!(ip, error = %e, "Reverse lookup failed.");
                None
            }
            Err(_) => {
                debug!(ip, "Reverse lookup timed out.");
                None
            }
        }
    }
}

/// Resolver that never answers. Used when lookups are switched off.
pub struct NoResolver;

#[async_trait]
impl Resolve for NoResolver {
    async fn forward(&self, _hostname: &str) -> Option<String> {
        None
    }

    async fn reverse(&self, _ip: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::config::NameServerConfigGroup;
    use std::net::Ipv4Addr;
    use std::time::Instant;

    /// A resolver whose only nameserver sits in TEST-NET-1 and never answers.
    fn silent_resolver(deadline: Duration) -> DnsResolver {
        let servers = NameServerConfigGroup::from_ips_clear(
            &[IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))],
            53,
            true,
        );
        let config = ResolverConfig::from_parts(None, vec![], servers);
        let mut opts = ResolverOpts::default();
        opts.use_hosts_file = false;
        DnsResolver::with_config(config, opts, deadline)
    }

    #[tokio::test]
    async fn timed_out_lookups_read_as_no_answer() {
        let deadline = Duration::from_millis(100);
        let resolver = silent_resolver(deadline);

        let started = Instant::now();
        assert_eq!(resolver.forward("host.example.com").await, None);
        assert_eq!(resolver.reverse("9.9.9.9").await, None);

        // Two lookups, each cut off at the deadline, plus scheduling slack.
        assert!(started.elapsed() < deadline * 2 + Duration::from_millis(400));
    }

    #[tokio::test]
    async fn reverse_skips_unparseable_addresses() {
        let resolver = silent_resolver(Duration::from_millis(100));
        assert_eq!(resolver.reverse("not-an-ip").await, None);
    }

    #[tokio::test]
    async fn no_resolver_never_answers() {
        assert_eq!(NoResolver.forward("host.example.com").await, None);
        assert_eq!(NoResolver.reverse("9.9.9.9").await, None);
    }
}
