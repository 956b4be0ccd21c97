// src/cli.rs

use clap::{Args, Parser, Subcommand};
use recon_aggregator::config::Config;
use recon_aggregator::ExportOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recon-aggregator")]
#[command(about = "Aggregate, enrich and export reconnaissance results.")]
pub struct CommandLine {
    /// JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory holding scanner output and receiving exports
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Concurrent header probes
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// Do not complete half pairs through DNS
    #[arg(long, global = true)]
    pub no_dns: bool,

    /// Debug output on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse scanner output into the store
    #[command(alias = "a")]
    Aggregate(IngestArgs),
    /// Fetch HTTP/HTTPS headers for stored targets
    Headers {
        #[arg(short, long)]
        domain: String,
    },
    /// Write flat files from the store
    #[command(alias = "e")]
    Export(ExportArgs),
    /// Aggregate, fetch headers and export in one go
    #[command(alias = "r")]
    Run {
        #[command(flatten)]
        ingest: IngestArgs,
        #[command(flatten)]
        export: ExportFlags,
    },
}

#[derive(Args)]
pub struct IngestArgs {
    #[arg(short, long)]
    pub domain: String,

    /// Output file to parse, relative to the output directory or as given
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// Folder under the output directory to parse recursively
    #[arg(long = "folder")]
    pub folders: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(short, long)]
    pub domain: String,

    #[command(flatten)]
    pub flags: ExportFlags,
}

#[derive(Args, Clone, Copy)]
pub struct ExportFlags {
    /// Write aggregated_ips.txt
    #[arg(long)]
    pub ips: bool,
    /// Write aggregated_hostnames.txt and aggregated_protocol_hostnames.txt
    #[arg(long)]
    pub hostnames: bool,
    /// Write one headers/<hostname>_headers.txt per enriched hostname
    #[arg(long)]
    pub headers: bool,
    /// Write aggregated/index.json
    #[arg(long)]
    pub index: bool,
}

impl ExportFlags {
    /// No flag at all means the default ip and hostname lists.
    pub fn options(self) -> ExportOptions {
        if !(self.ips || self.hostnames || self.headers || self.index) {
            return ExportOptions::default();
        }
        ExportOptions {
            ips: self.ips,
            hostnames: self.hostnames,
            headers: self.headers,
            index: self.index,
        }
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies command-line overrides on top of `config`.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(db) = &self.db {
            config.database = db.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.no_dns {
            config.no_dns = true;
        }
        config
    }
}
