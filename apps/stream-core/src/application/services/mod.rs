//! Application Services
//!
//! Services that orchestrate domain logic through the ports.
//!
//! - `StrategyRunner`: Sequential slice execution for TWAP and grid runs

mod strategy_runner;

pub use strategy_runner::{FailurePolicy, StrategyRunner};
