//! Binance REST Order Gateway
//!
//! [`OrderGateway`] adapter placing orders through `POST /api/v3/order`.
//! The intent's idempotency key is forwarded as `newClientOrderId`, so a
//! resubmitted slice is rejected by the venue as a duplicate instead of
//! double-executing. Venue error codes are classified into the gateway
//! error taxonomy; the gateway itself never retries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal::Decimal;

use crate::application::ports::{GatewayError, OrderGateway};
use crate::domain::identity::StreamCredentials;
use crate::domain::order::{OrderIntent, OrderResult};
use crate::infrastructure::config::Endpoints;

use super::codec::status_from_wire;
use super::messages::{ApiError, OrderAck};
use super::signing;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum decimal places the Spot API accepts for quantities and prices.
const VENUE_DECIMALS: u32 = 8;

/// Clamp a planner-produced value to venue precision.
///
/// Equal-split planning can produce repeating decimals; unrounded they fail
/// the venue's LOT_SIZE and PRICE_FILTER checks on every slice.
fn to_venue_precision(value: Decimal) -> Decimal {
    value.round_dp(VENUE_DECIMALS).normalize()
}

/// Order gateway backed by the Binance Spot REST API.
pub struct BinanceOrderGateway {
    http: reqwest::Client,
    endpoints: Endpoints,
    credentials: StreamCredentials,
    recv_window_ms: u64,
}

impl BinanceOrderGateway {
    /// Create a gateway with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the HTTP client cannot be built.
    pub fn new(
        endpoints: Endpoints,
        credentials: StreamCredentials,
        recv_window_ms: u64,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoints,
            credentials,
            recv_window_ms,
        })
    }

    /// Build the unsigned query string for one intent, with quantity and
    /// prices clamped to venue precision.
    fn build_query(&self, intent: &OrderIntent, timestamp_ms: i64) -> String {
        let mut query = format!(
            "symbol={}&side={}&type={}&quantity={}",
            intent.symbol,
            intent.side.as_str(),
            intent.kind.as_str(),
            to_venue_precision(intent.quantity)
        );
        if let Some(price) = intent.price {
            query.push_str(&format!(
                "&price={}&timeInForce=GTC",
                to_venue_precision(price)
            ));
        }
        if let Some(stop_price) = intent.stop_price {
            query.push_str(&format!("&stopPrice={}", to_venue_precision(stop_price)));
        }
        query.push_str(&format!(
            "&newClientOrderId={}&newOrderRespType=FULL&recvWindow={}&timestamp={timestamp_ms}",
            intent.idempotency_key, self.recv_window_ms
        ));
        query
    }
}

#[async_trait]
impl OrderGateway for BinanceOrderGateway {
    async fn place_order(&self, intent: &OrderIntent) -> Result<OrderResult, GatewayError> {
        let query = self.build_query(intent, Utc::now().timestamp_millis());
        let signature = signing::sign(self.credentials.api_secret(), &query)
            .map_err(|error| GatewayError::Fatal(error.to_string()))?;
        let url = format!("{}?{query}&signature={signature}", self.endpoints.order_url());

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, self.credentials.api_key())
            .send()
            .await
            .map_err(|error| GatewayError::Transient(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let ack: OrderAck = response
                .json()
                .await
                .map_err(|error| GatewayError::Transient(error.to_string()))?;
            ack_to_result(&ack)
        } else {
            let body = response
                .text()
                .await
                .map_err(|error| GatewayError::Transient(error.to_string()))?;
            Err(classify_failure(status, &body))
        }
    }
}

fn ack_to_result(ack: &OrderAck) -> Result<OrderResult, GatewayError> {
    let order_status = status_from_wire(&ack.status).ok_or_else(|| {
        GatewayError::Transient(format!("unrecognized order status: {}", ack.status))
    })?;
    Ok(OrderResult {
        exchange_order_id: ack.order_id.to_string(),
        status: order_status,
        filled_quantity: ack.executed_quantity,
        avg_fill_price: ack.avg_fill_price(),
    })
}

/// Map an HTTP failure into the gateway error taxonomy.
///
/// When the venue returned a structured error body, its code decides; the
/// HTTP status is the fallback for opaque failures.
fn classify_failure(status: StatusCode, body: &str) -> GatewayError {
    if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
        return classify_api_error(&api_error);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Fatal(format!("{status}: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::IM_A_TEAPOT => {
            GatewayError::Transient(format!("rate limited: {status}"))
        }
        _ if status.is_server_error() => GatewayError::Transient(format!("{status}: {body}")),
        _ => GatewayError::Rejected(format!("{status}: {body}")),
    }
}

fn classify_api_error(error: &ApiError) -> GatewayError {
    let message = format!("{}: {}", error.code, error.msg);
    match error.code {
        // Invalid key, signature or permissions: the credential set is bad.
        -2014 | -2015 | -1022 => GatewayError::Fatal(message),
        // Timestamp outside recvWindow: clock skew, retryable.
        -1021 => GatewayError::Transient(message),
        // Filter failures and malformed parameters.
        -1013 | -1199..=-1100 => GatewayError::Validation(message),
        // Everything else is a venue-side rejection of this order.
        _ => GatewayError::Rejected(message),
    }
}
