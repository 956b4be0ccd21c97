// src/main.rs

use color_eyre::eyre::{ensure, Result, WrapErr};
use std::sync::Arc;
use tracing::{error, info};

mod cli;
mod logging;

use cli::{CommandLine, Commands};
use recon_aggregator::config::Config;
use recon_aggregator::core::enricher::fetcher::{HeaderFetcher, HttpFetcher};
use recon_aggregator::core::extractor::resolver::{DnsResolver, NoResolver, Resolve};
use recon_aggregator::{Aggregation, DomainKey, Store};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CommandLine::parse_args();
    logging::initialize_logging(args.verbose)?;

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let config = args.apply(config);
    info!(db = %config.database.display(), output = %config.output_dir.display(), "Configuration loaded.");

    if let Err(e) = run(args.command, &config).await {
        error!(error = %e, "Command failed.");
        return Err(e);
    }
    Ok(())
}

/// Wires the store, resolver and fetcher for one domain.
fn build_pipeline(config: &Config, domain: &str) -> Result<Aggregation> {
    let domain = DomainKey::new(domain);
    ensure!(!domain.name().is_empty(), "A target domain is required");
    let store = Arc::new(Store::new(&config.database));
    let resolver: Arc<dyn Resolve> = if config.no_dns {
        Arc::new(NoResolver)
    } else {
        Arc::new(DnsResolver::new(config.dns_timeout()))
    };
    let fetcher: Arc<dyn HeaderFetcher> = Arc::new(
        HttpFetcher::new(config.http_timeout(), &config.user_agent)
            .wrap_err("Failed to build HTTP client")?,
    );
    Ok(Aggregation::new(store, domain, &config.output_dir, resolver, fetcher)
        .with_workers(config.workers))
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Aggregate(ingest) => {
            let pipeline = build_pipeline(config, &ingest.domain)?;
            pipeline
                .aggregate(&ingest.files, &ingest.folders)
                .await
                .wrap_err("Aggregation failed")?;
        }
        Commands::Headers { domain } => {
            let pipeline = build_pipeline(config, &domain)?;
            let started = std::time::Instant::now();
            pipeline.headers().await.wrap_err("Header enrichment failed")?;
            info!(elapsed = ?started.elapsed(), "Headers stored.");
        }
        Commands::Export(export) => {
            let pipeline = build_pipeline(config, &export.domain)?;
            let report = pipeline
                .export(export.flags.options())
                .wrap_err("Export failed")?;
            for path in &report.written {
                println!("{}", path.display());
            }
        }
        Commands::Run { ingest, export } => {
            let pipeline = build_pipeline(config, &ingest.domain)?;
            pipeline
                .aggregate(&ingest.files, &ingest.folders)
                .await
                .wrap_err("Aggregation failed")?;
            pipeline.headers().await.wrap_err("Header enrichment failed")?;
            let report = pipeline
                .export(export.options())
                .wrap_err("Export failed")?;
            for path in &report.written {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}
