//! Order Intent and Result Types
//!
//! Value objects exchanged with the order gateway boundary. An
//! `OrderIntent` is an immutable instruction produced by strategy planning;
//! an `OrderResult` is the gateway's acknowledgment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl OrderSide {
    /// Get the exchange wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Market order, executed at the current price.
    Market,
    /// Limit order at a fixed price.
    Limit,
    /// Stop-loss order triggered at a stop price.
    StopLoss,
}

impl OrderKind {
    /// Get the exchange wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopLoss => "STOP_LOSS",
        }
    }
}

/// Exchange-reported order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted, not yet filled.
    New,
    /// Partially filled.
    PartiallyFilled,
    /// Completely filled.
    Filled,
    /// Canceled by the user.
    Canceled,
    /// Rejected by the venue.
    Rejected,
    /// Expired per its time-in-force.
    Expired,
}

impl OrderStatus {
    /// Whether this status is terminal (no further transitions).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }
}

/// Immutable order instruction produced by strategy planning.
///
/// The idempotency key is derived deterministically from
/// (strategy run id, slice index), so a retried submission of the same
/// slice carries the same key and an idempotency-aware gateway can reject
/// the duplicate instead of double-executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Trading pair symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub kind: OrderKind,
    /// Base-asset quantity.
    pub quantity: Decimal,
    /// Limit price (limit orders).
    pub price: Option<Decimal>,
    /// Stop trigger price (stop orders).
    pub stop_price: Option<Decimal>,
    /// Deterministic duplicate-submission key.
    pub idempotency_key: String,
}

impl OrderIntent {
    /// Create a market order intent.
    #[must_use]
    pub fn market(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        idempotency_key: String,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            kind: OrderKind::Market,
            quantity,
            price: None,
            stop_price: None,
            idempotency_key,
        }
    }

    /// Create a limit order intent.
    #[must_use]
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        idempotency_key: String,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            kind: OrderKind::Limit,
            quantity,
            price: Some(price),
            stop_price: None,
            idempotency_key,
        }
    }
}

/// Gateway acknowledgment of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange-assigned order id.
    pub exchange_order_id: String,
    /// Status at acknowledgment time.
    pub status: OrderStatus,
    /// Quantity filled so far.
    pub filled_quantity: Decimal,
    /// Average fill price, if any quantity filled.
    pub avg_fill_price: Option<Decimal>,
}
