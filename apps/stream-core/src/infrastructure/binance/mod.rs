//! Binance Integration
//!
//! Everything that knows the Binance Spot wire formats lives here:
//!
//! - `messages`: serde types for user-data stream payloads and REST replies
//! - `codec`: wire payload → [`crate::domain::events::DomainEvent`]
//! - `signing`: HMAC-SHA256 request signing
//! - `gateway`: REST order-placement adapter
//! - `user_stream`: listen-key user-data stream connector

pub mod codec;
pub mod gateway;
pub mod messages;
pub mod signing;
pub mod user_stream;
