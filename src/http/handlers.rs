//! Gateway API handlers.

use axum::{
    Extension, Json,
    extract::{ConnectInfo, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::time::Instant;

use crate::gateway::TradeOutcome;
use crate::gateway::models::{ErrorResponse, TradeRequest, TradeResponse, validate_path_value};
use crate::http::client::ClientError;
use crate::http::server::AppState;
use crate::observability::metrics;

const TRADES_ROUTE: &str = "/api/v1/trades";
const PORTFOLIO_ROUTE: &str = "/api/v1/portfolio/{user_id}";
const MARKET_DATA_ROUTE: &str = "/api/v1/market-data/{symbol}";
const STATUS_ROUTE: &str = "/api/v1/circuit-breaker/status";
const BREAKER_ROUTE: &str = "/api/v1/circuit-breaker/{name}";
const HEALTH_ROUTE: &str = "/api/v1/health";

/// `POST /api/v1/trades`
pub async fn execute_trade(
    State(state): State<AppState>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> Response {
    let start = Instant::now();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Invalid trade request");
            return invalid_request(TRADES_ROUTE, rejection.body_text(), start);
        }
    };
    if let Err(message) = request.validate() {
        tracing::warn!(error = %message, "Invalid trade request");
        return invalid_request(TRADES_ROUTE, message, start);
    }

    let client_ip = connect_info.map(|Extension(ConnectInfo(addr))| addr.ip().to_string());
    let outcome = state.gateway.execute_trade(request, client_ip).await;
    let status = match outcome {
        TradeOutcome::Executed(_) => StatusCode::OK,
        TradeOutcome::RiskRejected(_) => StatusCode::BAD_REQUEST,
        TradeOutcome::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    metrics::record_request(TRADES_ROUTE, status.as_u16(), start);
    let body: TradeResponse = outcome.into_response();
    (status, Json(body)).into_response()
}

/// `GET /api/v1/portfolio/{user_id}`
pub async fn portfolio(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let start = Instant::now();
    if let Err(message) = validate_path_value("userId", &user_id) {
        return invalid_request(PORTFOLIO_ROUTE, message, start);
    }
    match state.gateway.portfolio(&user_id).await {
        Ok(portfolio) => {
            metrics::record_request(PORTFOLIO_ROUTE, 200, start);
            Json(portfolio).into_response()
        }
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to get portfolio");
            downstream_error(
                PORTFOLIO_ROUTE,
                &e,
                "Failed to retrieve portfolio",
                "PORTFOLIO_SERVICE_ERROR",
                start,
            )
        }
    }
}

/// `GET /api/v1/market-data/{symbol}`
pub async fn market_data(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let start = Instant::now();
    if let Err(message) = validate_path_value("symbol", &symbol) {
        return invalid_request(MARKET_DATA_ROUTE, message, start);
    }
    match state.gateway.market_data(&symbol).await {
        Ok(data) => {
            metrics::record_request(MARKET_DATA_ROUTE, 200, start);
            Json(data).into_response()
        }
        Err(e) => {
            tracing::error!(symbol = %symbol, error = %e, "Failed to get market data");
            downstream_error(
                MARKET_DATA_ROUTE,
                &e,
                "Failed to retrieve market data",
                "MARKET_DATA_SERVICE_ERROR",
                start,
            )
        }
    }
}

/// `GET /api/v1/circuit-breaker/status`
pub async fn breaker_status(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let status = state.gateway.status();
    metrics::record_request(STATUS_ROUTE, 200, start);
    Json(status).into_response()
}

/// `GET /api/v1/circuit-breaker/{name}`
pub async fn breaker(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let start = Instant::now();
    let mut status = state.gateway.status();
    match status.breakers.remove(&name) {
        Some(breaker) => {
            metrics::record_request(BREAKER_ROUTE, 200, start);
            Json(breaker).into_response()
        }
        None => {
            metrics::record_request(BREAKER_ROUTE, 404, start);
            let body = ErrorResponse::new(
                "Unknown circuit breaker",
                format!(
                    "no circuit breaker named {}; known: {}",
                    name,
                    state.gateway.breakers().names().join(", ")
                ),
                "NOT_FOUND",
            );
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
    }
}

/// `GET /api/v1/health`
pub async fn health(State(state): State<AppState>) -> Response {
    let start = Instant::now();
    let health = state.gateway.health();
    metrics::record_request(HEALTH_ROUTE, 200, start);
    Json(health).into_response()
}

fn invalid_request(route: &'static str, message: String, start: Instant) -> Response {
    metrics::record_request(route, 400, start);
    let body = ErrorResponse::new("Invalid request format", message, "INVALID_REQUEST");
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Map a failed downstream call: 503 while the breaker is open, 500 otherwise.
fn downstream_error(
    route: &'static str,
    err: &ClientError,
    error: &str,
    code: &str,
    start: Instant,
) -> Response {
    let status = if err.is_circuit_open() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    metrics::record_request(route, status.as_u16(), start);
    (status, Json(ErrorResponse::new(error, err.to_string(), code))).into_response()
}
