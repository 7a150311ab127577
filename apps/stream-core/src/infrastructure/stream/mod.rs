//! Streaming Machinery
//!
//! The pieces between the upstream user-data connection and the
//! subscribers:
//!
//! - `broadcast`: per-session fan-out with prune-on-failure
//! - `session`: one live upstream connection's decode and fan-out tasks
//! - `registry`: refcounted one-session-per-identity lifecycle

pub mod broadcast;
pub mod registry;
pub mod session;
