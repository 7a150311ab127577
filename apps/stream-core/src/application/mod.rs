//! Application Layer
//!
//! Use cases and port definitions following the Hexagonal Architecture
//! pattern: the ports are the contracts infrastructure adapters implement,
//! the services orchestrate domain logic through them.

pub mod ports;
pub mod services;
