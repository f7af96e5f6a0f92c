//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Build breakers and clients from configuration
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)
//! - Metrics install is separate from `start` since the recorder is global

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::gateway::{GatewayError, TradingGateway};
use crate::http::GatewayServer;
use crate::lifecycle::{Shutdown, signals};
use crate::observability::{MetricsRegistry, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A gateway accepting traffic.
pub struct RunningGateway {
    pub local_addr: SocketAddr,
    pub gateway: Arc<TradingGateway>,
    server: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningGateway {
    /// Wait for the server to finish draining after shutdown.
    pub async fn wait(self) -> Result<(), StartupError> {
        self.server.await?.map_err(StartupError::Server)
    }
}

/// Build the gateway and start serving. Stops when `shutdown` triggers.
pub async fn start(config: &GatewayConfig, shutdown: &Shutdown) -> Result<RunningGateway, StartupError> {
    let observer = Arc::new(MetricsRegistry::new());
    let gateway = Arc::new(TradingGateway::new(&config.services, observer, shutdown.token())?);
    tracing::info!(services = ?gateway.breakers().names(), "Circuit breakers ready");

    let address = &config.server.bind_address;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: address.clone(),
        source,
    })?;

    let server = GatewayServer::new(&config.server, gateway.clone());
    let server = tokio::spawn(server.run(listener, shutdown.subscribe()));
    tracing::info!(address = %local_addr, "Listening for connections");

    Ok(RunningGateway {
        local_addr,
        gateway,
        server,
    })
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    let observability = &config.observability;
    if observability.metrics_enabled {
        let addr: SocketAddr = observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let running = start(&config, &shutdown).await?;
    let signals = signals::spawn_signal_handler(shutdown.clone());

    let result = running.wait().await;
    signals.abort();
    shutdown.trigger();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut config = GatewayConfig::default();
        config.server.bind_address = "127.0.0.1:0".to_string();

        let shutdown = Shutdown::new();
        let running = start(&config, &shutdown).await.unwrap();
        assert_ne!(running.local_addr.port(), 0);
        assert_eq!(running.gateway.breakers().len(), 5);

        shutdown.trigger();
        running.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = GatewayConfig::default();
        config.server.bind_address = taken.local_addr().unwrap().to_string();

        let err = start(&config, &Shutdown::new()).await.err().unwrap();
        assert!(matches!(err, StartupError::Bind { .. }));
    }
}
