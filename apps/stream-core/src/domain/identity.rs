//! Trading Identity Types
//!
//! A trading identity addresses one exchange account context: one user with
//! one active credential set. Stream sessions are keyed by it, and at most
//! one live session exists per identity at any instant.

use std::fmt;

/// Opaque key identifying one set of exchange credentials
/// (one user × one active API key).
///
/// Immutable once a session is open; the session registry uses it as the
/// map key for the one-session-per-identity invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradingIdentity(String);

impl TradingIdentity {
    /// Create a new trading identity from an opaque key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the identity key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TradingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TradingIdentity {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Exchange API credentials used to open a user-data stream.
#[derive(Clone)]
pub struct StreamCredentials {
    api_key: String,
    api_secret: String,
}

impl StreamCredentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl fmt::Debug for StreamCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCredentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}
