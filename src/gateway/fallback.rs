//! Degraded answers used when a dependency is unavailable.

use chrono::Utc;

use crate::gateway::models::{MarketData, RiskCheckRequest, RiskCheckResponse, TradeRequest};

/// Largest trade value the fallback risk rule approves.
pub const MAX_FALLBACK_TRADE_VALUE: f64 = 50_000.0;

/// Market data built from the client's own quote.
pub fn market_data(request: &TradeRequest) -> MarketData {
    MarketData {
        symbol: request.symbol.clone(),
        price: request.price,
        timestamp: Utc::now(),
        ..Default::default()
    }
}

/// Conservative risk rule applied without the risk service.
pub fn risk_check(request: &RiskCheckRequest) -> RiskCheckResponse {
    if request.total_value > MAX_FALLBACK_TRADE_VALUE {
        RiskCheckResponse {
            approved: false,
            reason: format!(
                "Trade value exceeds maximum allowed (${:.2})",
                MAX_FALLBACK_TRADE_VALUE
            ),
            risk_score: 0.9,
        }
    } else {
        RiskCheckResponse {
            approved: true,
            reason: "Approved by fallback risk check".to_string(),
            risk_score: 0.3,
        }
    }
}
