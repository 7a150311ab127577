//! Binance Wire Message Types
//!
//! Serde shapes for the payloads crossing the Binance boundary: user-data
//! stream frames (tagged by the `e` field) and the REST replies the order
//! gateway and user-stream connector consume. Field names follow the
//! exchange's single-letter wire keys; everything numeric that the venue
//! sends as a decimal string is parsed with [`rust_decimal`]'s string serde.

use rust_decimal::Decimal;
use serde::Deserialize;

// =============================================================================
// User-Data Stream Frames
// =============================================================================

/// One frame off the user-data stream, dispatched on the `e` tag.
///
/// Frame types this core does not consume (`balanceUpdate`,
/// `listStatus`, ...) fall into `Unknown` and are skipped by the codec.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "e")]
pub enum UserDataFrame {
    /// Order lifecycle update.
    #[serde(rename = "executionReport")]
    ExecutionReport(ExecutionReport),

    /// Full account balance snapshot.
    #[serde(rename = "outboundAccountPosition")]
    AccountPosition(AccountPosition),

    /// In-band error frame from the stream endpoint.
    #[serde(rename = "error")]
    Error(StreamErrorFrame),

    /// Any frame type this core does not consume.
    #[serde(other)]
    Unknown,
}

/// `executionReport` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionReport {
    /// Trading pair symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Order side, e.g. `BUY`.
    #[serde(rename = "S")]
    pub side: String,

    /// Order type, e.g. `LIMIT`.
    #[serde(rename = "o")]
    pub order_type: String,

    /// Current order status, e.g. `FILLED`.
    #[serde(rename = "X")]
    pub status: String,

    /// Exchange-assigned order id.
    #[serde(rename = "i")]
    pub order_id: i64,

    /// Original order quantity.
    #[serde(rename = "q", with = "rust_decimal::serde::str")]
    pub quantity: Decimal,

    /// Original order price; zero for market orders.
    #[serde(rename = "p", with = "rust_decimal::serde::str")]
    pub price: Decimal,

    /// Cumulative filled quantity.
    #[serde(rename = "z", with = "rust_decimal::serde::str")]
    pub cumulative_filled: Decimal,

    /// Price of the last execution; zero when no execution happened.
    #[serde(rename = "L", with = "rust_decimal::serde::str")]
    pub last_executed_price: Decimal,

    /// Commission charged for the last execution.
    #[serde(rename = "n", default, with = "rust_decimal::serde::str_option")]
    pub commission: Option<Decimal>,

    /// Asset the commission was charged in; absent when no execution.
    #[serde(rename = "N", default)]
    pub commission_asset: Option<String>,

    /// Transaction time, milliseconds since the epoch.
    #[serde(rename = "T")]
    pub transaction_time_ms: i64,
}

/// `outboundAccountPosition` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountPosition {
    /// Balances changed by the triggering event.
    #[serde(rename = "B")]
    pub balances: Vec<WireBalance>,
}

/// One balance entry inside an account position frame.
#[derive(Debug, Clone, Deserialize)]
pub struct WireBalance {
    /// Asset symbol.
    #[serde(rename = "a")]
    pub asset: String,

    /// Freely available amount.
    #[serde(rename = "f", with = "rust_decimal::serde::str")]
    pub free: Decimal,

    /// Amount locked in open orders.
    #[serde(rename = "l", with = "rust_decimal::serde::str")]
    pub locked: Decimal,
}

/// In-band `error` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamErrorFrame {
    /// Error description from the stream endpoint.
    #[serde(rename = "m", default)]
    pub message: Option<String>,
}

// =============================================================================
// REST Replies
// =============================================================================

/// Successful reply to `POST /api/v3/order` (FULL response type).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    /// Exchange-assigned order id.
    pub order_id: i64,

    /// Status at acknowledgment time, e.g. `FILLED`.
    pub status: String,

    /// Quantity filled so far.
    #[serde(rename = "executedQty", with = "rust_decimal::serde::str")]
    pub executed_quantity: Decimal,

    /// Quote-asset volume filled so far; divided by the executed quantity
    /// this yields the average fill price.
    #[serde(rename = "cummulativeQuoteQty", with = "rust_decimal::serde::str")]
    pub cumulative_quote_quantity: Decimal,
}

impl OrderAck {
    /// Average fill price, when any quantity executed.
    #[must_use]
    pub fn avg_fill_price(&self) -> Option<Decimal> {
        if self.executed_quantity.is_zero() {
            None
        } else {
            Some(self.cumulative_quote_quantity / self.executed_quantity)
        }
    }
}

/// Error body the exchange returns with non-2xx status codes.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Venue error code, e.g. `-2010`.
    pub code: i32,

    /// Human-readable message.
    pub msg: String,
}

/// Reply to `POST /api/v3/userDataStream`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenKeyReply {
    /// Listen key addressing the account's user-data stream.
    pub listen_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const EXECUTION_REPORT: &str = r#"{
        "e": "executionReport",
        "E": 1700000000000,
        "s": "BTCUSDT",
        "c": "run-0",
        "S": "BUY",
        "o": "MARKET",
        "f": "GTC",
        "q": "0.00100000",
        "p": "0.00000000",
        "X": "FILLED",
        "i": 4293153,
        "l": "0.00100000",
        "z": "0.00100000",
        "L": "64000.00000000",
        "n": "0.00000100",
        "N": "BTC",
        "T": 1700000000001,
        "O": 1700000000000
    }"#;

    #[test]
    fn execution_report_frame_parses() {
        let frame: UserDataFrame = serde_json::from_str(EXECUTION_REPORT).unwrap();
        let UserDataFrame::ExecutionReport(report) = frame else {
            panic!("expected execution report");
        };

        assert_eq!(report.symbol, "BTCUSDT");
        assert_eq!(report.status, "FILLED");
        assert_eq!(report.order_id, 4_293_153);
        assert_eq!(report.cumulative_filled, dec!(0.001));
        assert_eq!(report.last_executed_price, dec!(64000));
        assert_eq!(report.commission, Some(dec!(0.000001)));
        assert_eq!(report.commission_asset.as_deref(), Some("BTC"));
    }

    #[test]
    fn account_position_frame_parses() {
        let payload = r#"{
            "e": "outboundAccountPosition",
            "E": 1700000000000,
            "u": 1700000000001,
            "B": [
                {"a": "BTC", "f": "0.5", "l": "0.1"},
                {"a": "USDT", "f": "0", "l": "0"}
            ]
        }"#;

        let frame: UserDataFrame = serde_json::from_str(payload).unwrap();
        let UserDataFrame::AccountPosition(position) = frame else {
            panic!("expected account position");
        };

        assert_eq!(position.balances.len(), 2);
        assert_eq!(position.balances[0].asset, "BTC");
        assert_eq!(position.balances[0].free, dec!(0.5));
    }

    #[test]
    fn unconsumed_frame_types_fall_through_to_unknown() {
        let payload = r#"{"e": "listStatus", "E": 1700000000000}"#;
        let frame: UserDataFrame = serde_json::from_str(payload).unwrap();

        assert!(matches!(frame, UserDataFrame::Unknown));
    }

    #[test]
    fn order_ack_computes_average_fill_price() {
        let payload = r#"{
            "symbol": "BTCUSDT",
            "orderId": 42,
            "orderListId": -1,
            "clientOrderId": "run-0",
            "transactTime": 1700000000000,
            "price": "0.00000000",
            "origQty": "0.00200000",
            "executedQty": "0.00200000",
            "cummulativeQuoteQty": "128.00000000",
            "status": "FILLED",
            "timeInForce": "GTC",
            "type": "MARKET",
            "side": "BUY"
        }"#;

        let ack: OrderAck = serde_json::from_str(payload).unwrap();
        assert_eq!(ack.order_id, 42);
        assert_eq!(ack.avg_fill_price(), Some(dec!(64000)));
    }

    #[test]
    fn unfilled_ack_has_no_average_price() {
        let ack = OrderAck {
            order_id: 1,
            status: "NEW".to_string(),
            executed_quantity: Decimal::ZERO,
            cumulative_quote_quantity: Decimal::ZERO,
        };
        assert_eq!(ack.avg_fill_price(), None);
    }

    #[test]
    fn api_error_parses() {
        let error: ApiError =
            serde_json::from_str(r#"{"code": -2010, "msg": "Account has insufficient balance"}"#)
                .unwrap();
        assert_eq!(error.code, -2010);
    }

    #[test]
    fn listen_key_reply_parses() {
        let reply: ListenKeyReply =
            serde_json::from_str(r#"{"listenKey": "pqia91ma19a5s61cv6a81va65sdf19v8a65a1"}"#)
                .unwrap();
        assert_eq!(reply.listen_key, "pqia91ma19a5s61cv6a81va65sdf19v8a65a1");
    }
}
