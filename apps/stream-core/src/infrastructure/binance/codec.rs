//! User-Data Stream Codec
//!
//! Turns one raw text payload from the upstream connection into at most one
//! [`DomainEvent`]. Decoding is total over well-formed JSON: frame types and
//! enum values this core does not consume are skipped, never errors. Only
//! malformed payloads surface as [`DecodeError`], which the session logs
//! and skips without tearing the stream down.

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::events::{
    AssetBalance, BalanceUpdateEvent, DomainEvent, OrderUpdateEvent, StreamErrorEvent,
};
use crate::domain::order::{OrderKind, OrderSide, OrderStatus};

use super::messages::{AccountPosition, ExecutionReport, UserDataFrame};

/// Outcome of decoding one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A consumable event.
    Event(DomainEvent),
    /// A well-formed frame this core does not consume.
    Skipped,
}

/// Payload that could not be decoded at all.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid JSON or misses required fields.
    #[error("malformed stream payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The exchange reported a timestamp outside the representable range.
    #[error("invalid transaction time: {0}")]
    InvalidTimestamp(i64),
}

/// Decode one raw text payload from the user-data stream.
///
/// # Errors
///
/// Returns [`DecodeError`] for payloads that are not well-formed frames;
/// the caller logs and skips them.
pub fn decode(payload: &str) -> Result<Decoded, DecodeError> {
    let frame: UserDataFrame = serde_json::from_str(payload)?;
    match frame {
        UserDataFrame::ExecutionReport(report) => decode_execution_report(&report),
        UserDataFrame::AccountPosition(position) => Ok(decode_account_position(position)),
        UserDataFrame::Error(error) => Ok(Decoded::Event(DomainEvent::StreamError(
            StreamErrorEvent {
                message: error
                    .message
                    .unwrap_or_else(|| "unspecified stream error".to_string()),
            },
        ))),
        UserDataFrame::Unknown => {
            tracing::debug!("Skipping unconsumed user-data frame");
            Ok(Decoded::Skipped)
        }
    }
}

fn decode_execution_report(report: &ExecutionReport) -> Result<Decoded, DecodeError> {
    let (Some(side), Some(kind), Some(status)) = (
        parse_side(&report.side),
        parse_kind(&report.order_type),
        parse_status(&report.status),
    ) else {
        tracing::debug!(
            side = %report.side,
            order_type = %report.order_type,
            status = %report.status,
            "Skipping execution report with unconsumed enum value"
        );
        return Ok(Decoded::Skipped);
    };

    // Zero means "no execution yet" on the wire.
    let last_executed_price = if report.last_executed_price.is_zero() {
        None
    } else {
        Some(report.last_executed_price)
    };
    // Commission is only meaningful when an execution reported its asset.
    let commission = report
        .commission_asset
        .as_ref()
        .and_then(|_| report.commission);

    Ok(Decoded::Event(DomainEvent::OrderUpdate(OrderUpdateEvent {
        exchange_order_id: report.order_id.to_string(),
        symbol: report.symbol.clone(),
        side,
        kind,
        status,
        quantity: report.quantity,
        price: report.price,
        executed_quantity: report.cumulative_filled,
        last_executed_price,
        commission,
        commission_asset: report.commission_asset.clone(),
        transaction_time: parse_timestamp(report.transaction_time_ms)?,
    })))
}

fn decode_account_position(position: AccountPosition) -> Decoded {
    let balances: Vec<AssetBalance> = position
        .balances
        .into_iter()
        .filter(|balance| !(balance.free.is_zero() && balance.locked.is_zero()))
        .map(|balance| AssetBalance {
            asset: balance.asset,
            free: balance.free,
            locked: balance.locked,
        })
        .collect();

    // An all-zero snapshot carries no information; never publish it.
    if balances.is_empty() {
        Decoded::Skipped
    } else {
        Decoded::Event(DomainEvent::BalanceUpdate(BalanceUpdateEvent { balances }))
    }
}

fn parse_side(wire: &str) -> Option<OrderSide> {
    match wire {
        "BUY" => Some(OrderSide::Buy),
        "SELL" => Some(OrderSide::Sell),
        _ => None,
    }
}

fn parse_kind(wire: &str) -> Option<OrderKind> {
    match wire {
        "MARKET" => Some(OrderKind::Market),
        "LIMIT" => Some(OrderKind::Limit),
        "STOP_LOSS" => Some(OrderKind::StopLoss),
        _ => None,
    }
}

fn parse_status(wire: &str) -> Option<OrderStatus> {
    match wire {
        "NEW" => Some(OrderStatus::New),
        "PARTIALLY_FILLED" => Some(OrderStatus::PartiallyFilled),
        "FILLED" => Some(OrderStatus::Filled),
        "CANCELED" => Some(OrderStatus::Canceled),
        "REJECTED" => Some(OrderStatus::Rejected),
        "EXPIRED" | "EXPIRED_IN_MATCH" => Some(OrderStatus::Expired),
        _ => None,
    }
}

fn parse_timestamp(millis: i64) -> Result<DateTime<Utc>, DecodeError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(DecodeError::InvalidTimestamp(millis))
}

/// Map a wire status string from a REST reply into the domain status.
///
/// Shared with the order gateway; statuses this core does not track map
/// to `None`.
#[must_use]
pub fn status_from_wire(wire: &str) -> Option<OrderStatus> {
    parse_status(wire)
}
