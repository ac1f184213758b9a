//! gridx server - Entry Point
//!
//! Serves the telemetry hub and, when configured, the device monitor.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use gridx_server::config::DEFAULT_CONFIG_PATH;

/// Smart-grid telemetry hub
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "GRIDX_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    gridx_telemetry::init_logging()?;

    info!("Starting gridx v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %args.config, "Loading configuration");

    let config = gridx_server::AppConfig::load(&args.config)?;
    info!(
        listen = %config.hub.listen_addr(),
        devices = config.devices.is_some(),
        "Configuration loaded"
    );

    let app = gridx_server::Application::new(config)?;
    app.run().await?;

    Ok(())
}
