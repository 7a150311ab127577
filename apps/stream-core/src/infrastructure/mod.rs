//! Infrastructure Layer
//!
//! Adapters and external integrations: the Binance wire boundary, the
//! streaming machinery (broadcaster, session, registry), persistence,
//! configuration, and telemetry.

pub mod binance;
pub mod config;
pub mod persistence;
pub mod stream;
pub mod telemetry;
