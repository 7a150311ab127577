//! Domain Layer
//!
//! Pure types and logic with no I/O dependencies: identities, order
//! intents, decoded stream events, and strategy planning.

pub mod events;
pub mod identity;
pub mod order;
pub mod strategy;
