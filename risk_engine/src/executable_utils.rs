use clap::Parser;
use common::config::Config;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{error::Error, net::SocketAddr};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "address_risk/config/dev.yaml")]
    pub config: String,

    /// JSON-lines file with one analysis request per line
    #[arg(short, long)]
    pub input: String,

    /// Where to write JSON-lines outcomes; stdout when omitted
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Loads `.env`, parses CLI args, reads the config and installs tracing.
pub fn initialize_executable() -> Result<(Args, Config), Box<dyn Error + Send + Sync>> {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    initialize_tracing(&config.processor.log_level);

    info!(config = %args.config, project = %config.common.project_name, "Configuration loaded");
    Ok((args, config))
}

/// `RUST_LOG` wins over the configured level when set.
pub fn initialize_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Ignore the error when a subscriber is already installed (tests, embedding).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Starts a Prometheus scrape endpoint on `address`.
pub fn install_metrics_exporter(address: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let address: SocketAddr = address.parse()?;
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;
    info!(%address, "Prometheus exporter listening");
    Ok(())
}
