//! Trading Gateway
//!
//! Routes trades to downstream services, each guarded by its own circuit
//! breaker.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               TRADING GATEWAY                │
//!                        │                                              │
//!     Client Request     │  ┌────────┐   ┌──────────┐   ┌───────────┐   │
//!     ───────────────────┼─▶│  http  │──▶│ gateway  │──▶│  service  │───┼──▶ market-data
//!                        │  │ server │   │ service  │   │  clients  │───┼──▶ portfolio
//!                        │  └────────┘   └────┬─────┘   └─────┬─────┘───┼──▶ risk-management
//!                        │                    │               │     ────┼──▶ notification
//!                        │               ┌────▼─────┐   ┌─────▼─────┐───┼──▶ audit
//!                        │               │ fallback │   │  circuit  │   │
//!                        │               │  rules   │   │ breakers  │   │
//!                        │               └──────────┘   └─────┬─────┘   │
//!                        │                                    │         │
//!                        │  ┌─────────────────────────────────▼───────┐ │
//!                        │  │ observability: logs, metrics, tallies   │ │
//!                        │  └─────────────────────────────────────────┘ │
//!                        └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use trading_gateway::config::loader::load_config;
use trading_gateway::config::GatewayConfig;
use trading_gateway::lifecycle::startup;
use trading_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "trading-gateway")]
#[command(about = "Trading gateway with per-dependency circuit breakers", long_about = None)]
struct Args {
    /// Path to a TOML config file; defaults are used without one
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "trading-gateway starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        request_timeout_secs = config.server.request_timeout_secs,
        config_file = ?args.config,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
