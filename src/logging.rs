// src/logging.rs

use color_eyre::eyre::Result;
use lazy_static::lazy_static;
use recon_aggregator::config::get_data_dir;
use time::macros::format_description;
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

/// Installs a file layer in the data directory and a terse stderr layer.
///
/// `RUST_LOG` wins over `RECON_AGGREGATOR_LOGLEVEL`; `verbose` only raises the
/// default stderr level when neither is set.
pub fn initialize_logging(verbose: bool) -> Result<()> {
    let directory = get_data_dir();
    std::fs::create_dir_all(&directory)?;
    let log_path = directory.join(LOG_FILE.clone());
    let log_file = std::fs::File::create(log_path)?;

    let configured = std::env::var("RUST_LOG").or_else(|_| std::env::var(LOG_ENV.clone()));
    let crate_name = env!("CARGO_CRATE_NAME");
    let file_log_level = configured
        .clone()
        .unwrap_or_else(|_| format!("{crate_name}=debug"));
    let console_log_level = configured.unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        format!("{crate_name}={level}")
    });

    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ));

    let file_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_timer(timer.clone())
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(file_log_level));

    let console_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer)
        .with_target(false)
        .with_filter(EnvFilter::new(console_log_level));

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(console_subscriber)
        .with(ErrorLayer::default())
        .init();

    Ok(())
}
