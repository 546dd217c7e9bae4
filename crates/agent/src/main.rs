//! tstream - Telemetry streaming agent
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (empty declaration until one is applied)
//! tstream
//!
//! # Explicit bootstrap config and log level
//! tstream --config /etc/tstream/agent.toml --log-level debug
//! ```
//!
//! The agent starts from the last persisted declaration and runs until
//! SIGINT/SIGTERM. Declarations are applied through the config worker; this
//! binary only wires services together.

mod app;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tstream_config::{BootstrapConfig, LogFormat};

/// Telemetry streaming agent
#[derive(Parser, Debug)]
#[command(name = "tstream")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the bootstrap configuration file
    #[arg(short, long, default_value = "/etc/tstream/agent.toml")]
    config: std::path::PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing bootstrap file is fine: everything has defaults
    let bootstrap = if cli.config.exists() {
        BootstrapConfig::from_file(&cli.config)?
    } else {
        BootstrapConfig::default()
    };

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or_else(|| bootstrap.log.level.as_str());
    init_logging(level, bootstrap.log.format)?;

    tracing::info!(config = %cli.config.display(), "tstream agent starting");
    app::run(bootstrap).await
}

/// Initialize the tracing subscriber
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match format {
        LogFormat::Console => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_target(true))
                .with(filter)
                .init();
        }
    }
    Ok(())
}
