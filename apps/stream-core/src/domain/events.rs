//! User-Data Stream Domain Events
//!
//! Canonical internal representation of decoded upstream events. These are
//! codec-agnostic: the Binance wire shapes live in
//! `infrastructure::binance::messages` and are mapped into these types by
//! the stream codec.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::{OrderKind, OrderSide, OrderStatus};

/// Decoded event from a user-data stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Order lifecycle update (execution report).
    OrderUpdate(OrderUpdateEvent),
    /// Account balance snapshot.
    BalanceUpdate(BalanceUpdateEvent),
    /// Unrecoverable stream error; emitted at most once per session.
    StreamError(StreamErrorEvent),
}

impl DomainEvent {
    /// Extract the terminal fill from this event, if it is one.
    ///
    /// Only an order update whose status is `Filled` qualifies; this is the
    /// event that must reach the trade recorder exactly once per order id.
    #[must_use]
    pub fn as_terminal_fill(&self) -> Option<FillEvent> {
        match self {
            Self::OrderUpdate(update) if update.status == OrderStatus::Filled => {
                Some(FillEvent {
                    exchange_order_id: update.exchange_order_id.clone(),
                    symbol: update.symbol.clone(),
                    side: update.side,
                    quantity: update.executed_quantity,
                    price: update.last_executed_price,
                    commission: update.commission,
                    commission_asset: update.commission_asset.clone(),
                    transaction_time: update.transaction_time,
                })
            }
            _ => None,
        }
    }
}

/// Order lifecycle update decoded from an execution report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdateEvent {
    /// Exchange-assigned order id.
    pub exchange_order_id: String,
    /// Trading pair symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub kind: OrderKind,
    /// Current order status.
    pub status: OrderStatus,
    /// Original order quantity.
    pub quantity: Decimal,
    /// Original order price (zero for market orders).
    pub price: Decimal,
    /// Cumulative executed quantity.
    pub executed_quantity: Decimal,
    /// Price of the last execution, if any.
    pub last_executed_price: Option<Decimal>,
    /// Commission charged for the last execution, if any.
    pub commission: Option<Decimal>,
    /// Asset the commission was charged in.
    pub commission_asset: Option<String>,
    /// Exchange transaction time.
    pub transaction_time: DateTime<Utc>,
}

/// One non-zero asset balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// Asset symbol, e.g. `BTC`.
    pub asset: String,
    /// Freely available amount.
    pub free: Decimal,
    /// Amount locked in open orders.
    pub locked: Decimal,
}

/// Account balance snapshot.
///
/// Zero balances (free and locked both zero) are filtered out upstream of
/// this type; an event with an empty balance list is never published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdateEvent {
    /// Non-zero balances in the snapshot.
    pub balances: Vec<AssetBalance>,
}

/// Unrecoverable stream failure notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamErrorEvent {
    /// Human-readable failure description.
    pub message: String,
}

/// Terminal fill notification forwarded to the trade recorder.
///
/// Keyed by `exchange_order_id`; the recorder boundary deduplicates by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    /// Exchange-assigned order id, the dedup key.
    pub exchange_order_id: String,
    /// Trading pair symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Cumulative filled quantity.
    pub quantity: Decimal,
    /// Last execution price, if reported.
    pub price: Option<Decimal>,
    /// Commission, if reported.
    pub commission: Option<Decimal>,
    /// Commission asset, if reported.
    pub commission_asset: Option<String>,
    /// Exchange transaction time.
    pub transaction_time: DateTime<Utc>,
}
