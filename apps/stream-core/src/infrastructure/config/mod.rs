//! Core Configuration
//!
//! Environment-driven settings with sane defaults. Every knob can be
//! overridden via `STREAM_CORE_*` variables; a `.env` file is honored in
//! development.

use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Endpoints
// =============================================================================

/// Binance Spot endpoint set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// REST base URL, no trailing slash.
    pub rest_base: String,
    /// WebSocket stream base URL, no trailing slash.
    pub ws_base: String,
}

impl Endpoints {
    /// Production Spot endpoints.
    #[must_use]
    pub fn production() -> Self {
        Self {
            rest_base: "https://api.binance.com".to_string(),
            ws_base: "wss://stream.binance.com:9443".to_string(),
        }
    }

    /// Spot testnet endpoints.
    #[must_use]
    pub fn testnet() -> Self {
        Self {
            rest_base: "https://testnet.binance.vision".to_string(),
            ws_base: "wss://stream.testnet.binance.vision".to_string(),
        }
    }

    /// Order placement endpoint.
    #[must_use]
    pub fn order_url(&self) -> String {
        format!("{}/api/v3/order", self.rest_base)
    }

    /// Listen-key management endpoint.
    #[must_use]
    pub fn listen_key_url(&self) -> String {
        format!("{}/api/v3/userDataStream", self.rest_base)
    }

    /// User-data stream URL for a listen key.
    #[must_use]
    pub fn user_stream_url(&self, listen_key: &str) -> String {
        format!("{}/ws/{listen_key}", self.ws_base)
    }
}

// =============================================================================
// Core Config
// =============================================================================

/// Tunables for the streaming and execution core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Exchange endpoints (testnet by default; opt into production
    /// explicitly).
    pub endpoints: Endpoints,

    /// Capacity of the per-session decoded-event channel between the
    /// decode loop and the fan-out task.
    pub event_channel_capacity: usize,

    /// Per-subscriber buffered-event capacity before the subscriber is
    /// considered too slow and pruned.
    pub subscriber_buffer: usize,

    /// How long a session teardown may take before it is abandoned with
    /// a warning.
    pub teardown_timeout: Duration,

    /// Listen-key keepalive cadence; the venue expires idle keys after
    /// 60 minutes.
    pub keepalive_interval: Duration,

    /// `recvWindow` sent with signed REST requests, in milliseconds.
    pub recv_window_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::testnet(),
            event_channel_capacity: 256,
            subscriber_buffer: 64,
            teardown_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(30 * 60),
            recv_window_ms: 5_000,
        }
    }
}

impl CoreConfig {
    /// Load the configuration from the environment, falling back to
    /// defaults for unset variables. Reads `.env` first when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let use_production: bool =
            parse_var("STREAM_CORE_USE_PRODUCTION")?.unwrap_or(false);

        Ok(Self {
            endpoints: if use_production {
                Endpoints::production()
            } else {
                Endpoints::testnet()
            },
            event_channel_capacity: parse_var("STREAM_CORE_EVENT_CHANNEL_CAPACITY")?
                .unwrap_or(defaults.event_channel_capacity),
            subscriber_buffer: parse_var("STREAM_CORE_SUBSCRIBER_BUFFER")?
                .unwrap_or(defaults.subscriber_buffer),
            teardown_timeout: parse_var("STREAM_CORE_TEARDOWN_TIMEOUT_MS")?
                .map_or(defaults.teardown_timeout, Duration::from_millis),
            keepalive_interval: parse_var("STREAM_CORE_KEEPALIVE_INTERVAL_SECS")?
                .map_or(defaults.keepalive_interval, Duration::from_secs),
            recv_window_ms: parse_var("STREAM_CORE_RECV_WINDOW_MS")?
                .unwrap_or(defaults.recv_window_ms),
        })
    }
}

/// Configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A set environment variable failed to parse.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// The offending variable name.
        key: &'static str,
        /// Parse failure description.
        message: String,
    },
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|error| ConfigError::InvalidValue {
                key,
                message: error.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
