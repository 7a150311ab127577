//! Port Interfaces
//!
//! Contracts at the core's boundaries.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`OrderGateway`]: Order placement against the exchange
//! - [`TradeRecorder`]: Terminal-fill persistence
//! - [`UserStreamConnector`]: Opening upstream user-data connections
//!
//! ## Driver Ports (Inbound)
//!
//! - [`EventSink`]: A subscriber's view of the event fan-out

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::events::{DomainEvent, FillEvent};
use crate::domain::identity::{StreamCredentials, TradingIdentity};
use crate::domain::order::{OrderIntent, OrderResult};

// =============================================================================
// Order Gateway
// =============================================================================

/// Classified order-placement failure.
///
/// The strategy runner treats `Validation`, `Rejected` and `Transient`
/// identically (record and continue); `Fatal` halts the run. Retry policy,
/// if any, belongs to the gateway implementation or a higher-level caller,
/// never to the strategy engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Request was malformed or violates venue rules.
    #[error("validation error: {0}")]
    Validation(String),

    /// Venue rejected the order (insufficient balance, closed market, ...).
    #[error("order rejected: {0}")]
    Rejected(String),

    /// Transient transport or availability failure; a later retry of the
    /// same intent may succeed.
    #[error("transient gateway error: {0}")]
    Transient(String),

    /// Non-retryable condition (revoked credentials, permission loss).
    #[error("fatal gateway error: {0}")]
    Fatal(String),
}

/// Port for placing orders at the exchange.
///
/// Implementations may be slow or fail; the core never retries on its own.
/// An idempotency-aware gateway must treat two intents carrying the same
/// idempotency key as the same logical order.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit one order intent.
    async fn place_order(&self, intent: &OrderIntent) -> Result<OrderResult, GatewayError>;
}

// =============================================================================
// Trade Recorder
// =============================================================================

/// Trade recorder failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("trade recorder error: {0}")]
pub struct RecorderError(pub String);

/// Port consuming terminal fills.
///
/// The core calls this at-most-intentionally-once per terminal fill;
/// deduplication against persisted history (keyed by exchange order id)
/// is the implementation's responsibility.
#[async_trait]
pub trait TradeRecorder: Send + Sync {
    /// Persist one terminal fill.
    async fn record_fill(&self, fill: &FillEvent) -> Result<(), RecorderError>;
}

// =============================================================================
// Event Sink (Subscriber)
// =============================================================================

/// The subscriber's sink has gone away and must be pruned.
#[derive(Debug, Clone, thiserror::Error)]
#[error("event sink closed: {0}")]
pub struct SinkClosed(pub String);

/// A subscriber connection's event sink.
///
/// `send` must be non-blocking: implementations buffer internally and
/// report [`SinkClosed`] when the buffer is full or the consumer is gone,
/// so one slow subscriber can never stall the fan-out.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Failure causes immediate pruning.
    fn send(&self, event: DomainEvent) -> Result<(), SinkClosed>;

    /// Signal that no further events will be delivered.
    fn close(&self);
}

// =============================================================================
// Upstream User-Data Stream
// =============================================================================

/// Raw message from the upstream user-data connection, before decoding.
#[derive(Debug, Clone)]
pub enum RawStreamMessage {
    /// A text payload to decode.
    Payload(String),
    /// The upstream terminated without auto-recovery.
    Terminated(String),
}

/// A live upstream connection handed to a stream session.
///
/// Dropping or cancelling `closer` closes the upstream; the message
/// channel ends when the upstream is gone.
pub struct UserStreamConnection {
    /// Raw messages pumped off the upstream connection.
    pub messages: mpsc::Receiver<RawStreamMessage>,
    /// Cancel to close the upstream connection.
    pub closer: CancellationToken,
}

/// Failure to open an upstream user-data connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamConnectError {
    /// Credentials were rejected by the exchange.
    #[error("upstream authentication rejected: {0}")]
    AuthRejected(String),

    /// Transport-level failure while connecting.
    #[error("upstream transport error: {0}")]
    Transport(String),
}

/// Port opening upstream user-data connections.
///
/// `connect` resolves once the connection is confirmed open, not once it
/// is fully synchronized; early events are best-effort.
#[async_trait]
pub trait UserStreamConnector: Send + Sync {
    /// Open the user-data stream for one identity.
    async fn connect(
        &self,
        identity: &TradingIdentity,
        credentials: &StreamCredentials,
    ) -> Result<UserStreamConnection, StreamConnectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_render_their_class() {
        assert!(GatewayError::Validation("bad qty".into())
            .to_string()
            .contains("validation"));
        assert!(GatewayError::Transient("timeout".into())
            .to_string()
            .contains("transient"));
        assert!(GatewayError::Fatal("revoked".into())
            .to_string()
            .contains("fatal"));
    }
}
