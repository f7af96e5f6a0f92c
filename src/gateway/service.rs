//! Trade orchestration across the downstream services.
//!
//! # Trade Flow
//! ```text
//! execute_trade()
//!     → market data     (failure: use the request price)
//!     → risk check      (failure: fallback risk rule)
//!     → portfolio update (failure: trade rejected)
//!     → notification, audit (spawned, failures only logged)
//! ```

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::schema::{
    AUDIT_SERVICE, MARKET_DATA_SERVICE, NOTIFICATION_SERVICE, PORTFOLIO_SERVICE,
    RISK_MANAGEMENT_SERVICE,
};
use crate::config::{ServiceConfig, ServicesConfig};
use crate::gateway::fallback;
use crate::gateway::models::{
    AuditEvent, BreakerStatus, CircuitBreakerStatus, HealthResponse, MarketData,
    NotificationRequest, OrderStatus, Portfolio, PositionUpdate, RiskCheckRequest,
    RiskCheckResponse, TradeRequest, TradeResponse,
};
use crate::http::client::{ClientError, ServiceClient};
use crate::observability::MetricsRegistry;
use crate::resilience::{BreakerRegistry, BreakerState, RegistryError};

/// Errors building the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Breaker(#[from] RegistryError),

    #[error("no circuit breaker registered for {service}")]
    MissingBreaker { service: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Result of a trade request.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Executed(TradeResponse),
    /// Refused by the risk check (remote or fallback).
    RiskRejected(TradeResponse),
    /// The portfolio could not be updated.
    Failed(TradeResponse),
}

impl TradeOutcome {
    pub fn response(&self) -> &TradeResponse {
        match self {
            TradeOutcome::Executed(r) | TradeOutcome::RiskRejected(r) | TradeOutcome::Failed(r) => r,
        }
    }

    pub fn into_response(self) -> TradeResponse {
        match self {
            TradeOutcome::Executed(r) | TradeOutcome::RiskRejected(r) | TradeOutcome::Failed(r) => r,
        }
    }
}

/// The trading gateway: one guarded client per dependency.
#[derive(Debug)]
pub struct TradingGateway {
    market_data: ServiceClient,
    portfolio: ServiceClient,
    risk_management: ServiceClient,
    notification: ServiceClient,
    audit: ServiceClient,
    breakers: Arc<BreakerRegistry>,
    observer: Arc<MetricsRegistry>,
}

impl TradingGateway {
    /// Build breakers and clients for every configured dependency.
    ///
    /// Downstream calls fail with `Cancelled` once `cancel` fires.
    pub fn new(
        services: &ServicesConfig,
        observer: Arc<MetricsRegistry>,
        cancel: CancellationToken,
    ) -> Result<Self, GatewayError> {
        let breakers = Arc::new(BreakerRegistry::from_config(services, observer.clone())?);
        let client = |name: &str, config: &ServiceConfig| -> Result<ServiceClient, GatewayError> {
            let breaker = breakers.get(name).ok_or_else(|| GatewayError::MissingBreaker {
                service: name.to_string(),
            })?;
            Ok(ServiceClient::new(config, breaker, cancel.clone())?)
        };

        let market_data = client(MARKET_DATA_SERVICE, &services.market_data)?;
        let portfolio = client(PORTFOLIO_SERVICE, &services.portfolio)?;
        let risk_management = client(RISK_MANAGEMENT_SERVICE, &services.risk_management)?;
        let notification = client(NOTIFICATION_SERVICE, &services.notification)?;
        let audit = client(AUDIT_SERVICE, &services.audit)?;

        Ok(Self {
            market_data,
            portfolio,
            risk_management,
            notification,
            audit,
            breakers,
            observer,
        })
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Run a trade through market data, risk and portfolio.
    ///
    /// `client_ip` is recorded in the audit event.
    pub async fn execute_trade(&self, mut request: TradeRequest, client_ip: Option<String>) -> TradeOutcome {
        request.timestamp = Some(Utc::now());
        tracing::info!(
            user_id = %request.user_id,
            symbol = %request.symbol,
            quantity = request.quantity,
            order_type = request.order_type.as_str(),
            price = request.price,
            "Processing trade request"
        );

        let market = match self.market_data(&request.symbol).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Using fallback price, market data unavailable");
                fallback::market_data(&request)
            }
        };

        let risk_request = RiskCheckRequest::from(&request);
        let risk = match self
            .risk_management
            .post_json::<_, RiskCheckResponse>(&["api", "v1", "risk", "check"], &risk_request)
            .await
        {
            Ok(risk) => risk,
            Err(e) => {
                tracing::warn!(error = %e, "Applying fallback risk rule, risk check unavailable");
                fallback::risk_check(&risk_request)
            }
        };

        if !risk.approved {
            tracing::warn!(
                reason = %risk.reason,
                risk_score = risk.risk_score,
                "Trade rejected by risk management"
            );
            return TradeOutcome::RiskRejected(TradeResponse::rejected(
                &request,
                format!("Trade rejected: {}", risk.reason),
            ));
        }

        let update = PositionUpdate {
            symbol: request.symbol.clone(),
            quantity: request.quantity,
            price: market.price,
            action: request.order_type,
        };
        let path = ["api", "v1", "portfolio", request.user_id.as_str(), "positions"];
        if let Err(e) = self.portfolio.post(&path, &update).await {
            tracing::error!(error = %e, user_id = %request.user_id, "Failed to update portfolio");
            return TradeOutcome::Failed(TradeResponse::rejected(&request, "Failed to update portfolio"));
        }

        let trade_id = format!("TXN_{}_{}", Utc::now().timestamp(), request.user_id);
        let response = TradeResponse {
            trade_id: Some(trade_id.clone()),
            user_id: request.user_id.clone(),
            symbol: request.symbol.clone(),
            quantity: request.quantity,
            order_type: request.order_type,
            price: market.price,
            status: OrderStatus::Executed,
            message: Some("Trade executed successfully".to_string()),
            executed_at: Some(Utc::now()),
            total_value: market.price * request.quantity as f64,
        };

        self.notify(&response, &trade_id);
        self.record_audit(&response, &trade_id, risk.risk_score, client_ip);

        tracing::info!(
            trade_id = %trade_id,
            user_id = %response.user_id,
            symbol = %response.symbol,
            executed_price = response.price,
            "Trade executed"
        );
        TradeOutcome::Executed(response)
    }

    pub async fn portfolio(&self, user_id: &str) -> Result<Portfolio, ClientError> {
        self.portfolio
            .get_json(&["api", "v1", "portfolio", user_id])
            .await
    }

    pub async fn market_data(&self, symbol: &str) -> Result<MarketData, ClientError> {
        self.market_data
            .get_json(&["api", "v1", "prices", symbol])
            .await
    }

    /// Snapshot, tuning and tallies of every breaker.
    pub fn status(&self) -> CircuitBreakerStatus {
        let breakers = self
            .breakers
            .snapshots()
            .into_iter()
            .filter_map(|snapshot| {
                let breaker = self.breakers.get(&snapshot.name)?;
                let status = BreakerStatus {
                    configuration: breaker.config().clone(),
                    tally: self.observer.tally(&snapshot.name),
                    snapshot,
                };
                Some((status.snapshot.name.clone(), status))
            })
            .collect();

        CircuitBreakerStatus {
            breakers,
            timestamp: Utc::now(),
        }
    }

    /// Gateway health with the state of each breaker.
    pub fn health(&self) -> HealthResponse {
        let checks: BTreeMap<String, String> = self
            .clients()
            .iter()
            .map(|c| (c.service().to_string(), c.breaker_state().to_string()))
            .collect();
        let degraded = self
            .clients()
            .iter()
            .any(|c| c.breaker_state() == BreakerState::Open);
        let status = if degraded { "degraded" } else { "healthy" };

        HealthResponse {
            status: status.to_string(),
            service: "trading-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            checks,
        }
    }

    fn clients(&self) -> [&ServiceClient; 5] {
        [
            &self.market_data,
            &self.portfolio,
            &self.risk_management,
            &self.notification,
            &self.audit,
        ]
    }

    fn notify(&self, response: &TradeResponse, trade_id: &str) {
        let payload = NotificationRequest {
            user_id: response.user_id.clone(),
            kind: "TRADE_EXECUTED".to_string(),
            message: format!(
                "Trade executed: {} {} shares of {} at ${:.2}",
                response.order_type.as_str(),
                response.quantity,
                response.symbol,
                response.price
            ),
            data: trade_details(response, trade_id),
        };

        let client = self.notification.clone();
        tokio::spawn(async move {
            if let Err(e) = client.post(&["api", "v1", "notifications"], &payload).await {
                tracing::error!(error = %e, "Failed to send notification");
            }
        });
    }

    fn record_audit(&self, response: &TradeResponse, trade_id: &str, risk_score: f64, ip_address: Option<String>) {
        let mut details = trade_details(response, trade_id);
        details.insert("riskScore".to_string(), risk_score.into());

        let now = Utc::now();
        let event = AuditEvent {
            event_id: format!("AUDIT_{}", now.timestamp_nanos_opt().unwrap_or_default()),
            user_id: response.user_id.clone(),
            action: "TRADE_EXECUTED".to_string(),
            resource: "trading-gateway".to_string(),
            details,
            timestamp: now,
            ip_address,
        };

        let client = self.audit.clone();
        tokio::spawn(async move {
            if let Err(e) = client.post(&["api", "v1", "audit"], &event).await {
                tracing::error!(error = %e, "Failed to log audit event");
            }
        });
    }
}

fn trade_details(response: &TradeResponse, trade_id: &str) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("tradeId".to_string(), trade_id.into());
    details.insert("symbol".to_string(), response.symbol.clone().into());
    details.insert("quantity".to_string(), response.quantity.into());
    details.insert("orderType".to_string(), response.order_type.as_str().into());
    details.insert("price".to_string(), response.price.into());
    details.insert("totalValue".to_string(), response.total_value.into());
    details
}
