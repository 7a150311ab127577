//! Trade Persistence
//!
//! In-memory [`TradeRecorder`] keyed by exchange order id. Recording the
//! same order id again overwrites the stored fill, so redelivered terminal
//! fills stay idempotent across sessions as well as within one.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{RecorderError, TradeRecorder};
use crate::domain::events::FillEvent;

/// In-memory fill store.
#[derive(Default)]
pub struct InMemoryTradeRecorder {
    fills: RwLock<HashMap<String, FillEvent>>,
}

impl InMemoryTradeRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored fill for an order id, if any.
    #[must_use]
    pub fn fill(&self, exchange_order_id: &str) -> Option<FillEvent> {
        self.fills.read().get(exchange_order_id).cloned()
    }

    /// All stored fills, in no particular order.
    #[must_use]
    pub fn fills(&self) -> Vec<FillEvent> {
        self.fills.read().values().cloned().collect()
    }

    /// Number of distinct filled orders recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fills.read().len()
    }

    /// Whether no fill has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fills.read().is_empty()
    }
}

#[async_trait]
impl TradeRecorder for InMemoryTradeRecorder {
    async fn record_fill(&self, fill: &FillEvent) -> Result<(), RecorderError> {
        self.fills
            .write()
            .insert(fill.exchange_order_id.clone(), fill.clone());
        Ok(())
    }
}
