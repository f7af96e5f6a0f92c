//! Wire types shared by the gateway API and its downstream services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::CircuitBreakerConfig;
use crate::observability::ServiceTally;
use crate::resilience::BreakerSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Buy,
    Sell,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Buy => "BUY",
            OrderType::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Executed,
    Rejected,
    Cancelled,
}

/// Check a value that is sent downstream as a single URL path segment.
pub fn validate_path_value(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    if matches!(value, "." | "..") || value.contains(['/', '\\', '?', '#']) {
        return Err(format!("{} contains invalid characters", field));
    }
    Ok(())
}

/// Inbound trade request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub user_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub order_type: OrderType,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TradeRequest {
    /// Reject requests that cannot describe a trade.
    pub fn validate(&self) -> Result<(), String> {
        validate_path_value("userId", &self.user_id)?;
        validate_path_value("symbol", &self.symbol)?;
        if self.quantity < 1 {
            return Err("quantity must be at least 1".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err("price must be a non-negative number".to_string());
        }
        Ok(())
    }

    pub fn total_value(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    pub user_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub order_type: OrderType,
    pub price: f64,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_value: f64,
}

impl TradeResponse {
    /// Rejection echoing the request.
    pub fn rejected(request: &TradeRequest, message: impl Into<String>) -> Self {
        Self {
            trade_id: None,
            user_id: request.user_id.clone(),
            symbol: request.symbol.clone(),
            quantity: request.quantity,
            order_type: request.order_type,
            price: request.price,
            status: OrderStatus::Rejected,
            message: Some(message.into()),
            executed_at: None,
            total_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketData {
    pub symbol: String,
    pub price: f64,
    pub high: f64,
    pub low: f64,
    pub volume: i64,
    pub change: f64,
    pub change_percent: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub average_price: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Portfolio {
    pub user_id: String,
    pub positions: Vec<Position>,
    pub cash_balance: f64,
    pub total_value: f64,
    pub updated_at: DateTime<Utc>,
}

/// Position change sent to the portfolio service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionUpdate {
    pub symbol: String,
    pub quantity: i64,
    pub price: f64,
    pub action: OrderType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCheckRequest {
    pub user_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub order_type: OrderType,
    pub price: f64,
    pub total_value: f64,
}

impl From<&TradeRequest> for RiskCheckRequest {
    fn from(request: &TradeRequest) -> Self {
        Self {
            user_id: request.user_id.clone(),
            symbol: request.symbol.clone(),
            quantity: request.quantity,
            order_type: request.order_type,
            price: request.price,
            total_value: request.total_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCheckResponse {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default)]
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_id: String,
    pub user_id: String,
    pub action: String,
    pub resource: String,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Error body returned by the gateway API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            code: Some(code.to_string()),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Breaker state per dependency.
    pub checks: BTreeMap<String, String>,
}

/// One breaker as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStatus {
    #[serde(flatten)]
    pub snapshot: BreakerSnapshot,
    pub configuration: CircuitBreakerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<ServiceTally>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerStatus {
    pub breakers: BTreeMap<String, BreakerStatus>,
    pub timestamp: DateTime<Utc>,
}
