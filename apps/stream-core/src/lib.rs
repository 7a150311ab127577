#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access
    )
)]

//! Stream Core - Exchange Streaming & Execution Core
//!
//! The real-time core of the trading backend. It maintains at most one
//! Binance user-data WebSocket connection per trading identity and
//! multiplexes decoded events out to any number of subscribers, starting
//! the upstream lazily on the first attach and stopping it on the last
//! release. Independently, it executes slice-based order strategies
//! (TWAP and price grids) against an order gateway, recording every
//! per-slice outcome.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and planning logic
//!   - `identity`: Trading identities and stream credentials
//!   - `order`: Order intents, results, sides and statuses
//!   - `events`: Decoded user-data stream events
//!   - `strategy`: TWAP/grid planning and run bookkeeping
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Order gateway, trade recorder, subscriber sink, upstream connector
//!   - `services`: Sequential strategy runner
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: Wire types, codec, REST gateway, user-data connector
//!   - `stream`: Broadcaster, stream session, session registry
//!   - `persistence`: In-memory trade recorder
//!   - `config`: Environment-driven settings
//!   - `telemetry`: Tracing initialization
//!
//! # Data Flow
//!
//! ```text
//! Binance user-data WS ──► decode loop ──► event channel ──► fan-out task
//!                                                              │     │
//!                                                   subscribers┘     └► TradeRecorder
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure types and planning logic.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::{
    AssetBalance, BalanceUpdateEvent, DomainEvent, FillEvent, OrderUpdateEvent, StreamErrorEvent,
};
pub use domain::identity::{StreamCredentials, TradingIdentity};
pub use domain::order::{OrderIntent, OrderKind, OrderResult, OrderSide, OrderStatus};
pub use domain::strategy::{
    GridParams, RunStatus, SliceOutcome, StrategyError, StrategyKind, StrategyRun, StrategyRunId,
    TwapParams,
};

// Ports
pub use application::ports::{
    EventSink, GatewayError, OrderGateway, RawStreamMessage, RecorderError, SinkClosed,
    StreamConnectError, TradeRecorder, UserStreamConnection, UserStreamConnector,
};

// Services
pub use application::services::{FailurePolicy, StrategyRunner};

// Stream infrastructure
pub use infrastructure::stream::broadcast::{Broadcaster, ChannelSink, SubscriberId};
pub use infrastructure::stream::registry::{RegistryError, SessionRegistry, SubscriptionHandle};
pub use infrastructure::stream::session::SessionConfig;

// Binance adapters
pub use infrastructure::binance::gateway::BinanceOrderGateway;
pub use infrastructure::binance::user_stream::BinanceUserStreamConnector;

// Persistence
pub use infrastructure::persistence::InMemoryTradeRecorder;

// Config
pub use infrastructure::config::{ConfigError, CoreConfig, Endpoints};

// Telemetry
pub use infrastructure::telemetry::init_tracing;
