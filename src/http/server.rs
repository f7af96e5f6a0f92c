//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway API
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve on a bound listener until shutdown

use axum::{
    Router,
    http::HeaderName,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::gateway::TradingGateway;
use crate::http::handlers;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<TradingGateway>,
}

/// HTTP server for the trading gateway API.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &ServerConfig, gateway: Arc<TradingGateway>) -> Self {
        let router = Self::build_router(config, AppState { gateway });
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/api/v1/trades", post(handlers::execute_trade))
            .route("/api/v1/portfolio/{user_id}", get(handlers::portfolio))
            .route("/api/v1/market-data/{symbol}", get(handlers::market_data))
            .route("/api/v1/circuit-breaker/status", get(handlers::breaker_status))
            .route("/api/v1/circuit-breaker/{name}", get(handlers::breaker))
            .route("/api/v1/health", get(handlers::health))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServicesConfig;
    use crate::observability::MetricsRegistry;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn server() -> GatewayServer {
        let gateway = TradingGateway::new(
            &ServicesConfig::default(),
            Arc::new(MetricsRegistry::new()),
            CancellationToken::new(),
        )
        .unwrap();
        GatewayServer::new(&ServerConfig::default(), Arc::new(gateway))
    }

    #[tokio::test]
    async fn test_health_sets_request_id() {
        let response = server()
            .router()
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let response = server()
            .router()
            .oneshot(
                Request::get("/api/v1/circuit-breaker/status")
                    .header(X_REQUEST_ID, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_REQUEST_ID], "req-123");
    }

    #[tokio::test]
    async fn test_malformed_trade_is_rejected() {
        let response = server()
            .router()
            .oneshot(
                Request::post("/api/v1/trades")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"userId": "user1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_unknown_breaker_is_not_found() {
        let response = server()
            .router()
            .oneshot(
                Request::get("/api/v1/circuit-breaker/ledger-service")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["message"].as_str().unwrap().contains("audit-service, market-data-service"));
    }

    #[tokio::test]
    async fn test_encoded_traversal_in_path_is_rejected() {
        let server = server();
        for path in [
            "/api/v1/market-data/..%2F..%2Fadmin%2Freset",
            "/api/v1/market-data/%2E%2E",
            "/api/v1/portfolio/user1%3Fall=true",
        ] {
            let response = server
                .router()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
        }
    }
}
