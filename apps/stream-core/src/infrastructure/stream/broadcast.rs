//! Event Fan-Out
//!
//! Per-session broadcaster delivering each decoded event to every attached
//! subscriber sink. Delivery is non-blocking: a sink that fails (closed or
//! full) is pruned immediately and receives nothing further, and one bad
//! subscriber never affects the others or the upstream read loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::application::ports::{EventSink, SinkClosed};
use crate::domain::events::DomainEvent;

// =============================================================================
// Subscriber Identity
// =============================================================================

/// Opaque id of one attached subscriber sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Broadcaster
// =============================================================================

/// Fan-out of one session's events to its subscriber sinks.
#[derive(Default)]
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, Arc<dyn EventSink>>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    /// Create an empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink, returning its subscriber id.
    pub fn add(&self, sink: Arc<dyn EventSink>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().insert(id, sink);
        tracing::debug!(subscriber_id = %id, "Subscriber attached");
        id
    }

    /// Detach and close a sink. Returns whether it was attached.
    pub fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(&id);
        if let Some(sink) = removed {
            sink.close();
            tracing::debug!(subscriber_id = %id, "Subscriber detached");
            true
        } else {
            false
        }
    }

    /// Number of currently attached sinks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver one event to every attached sink, pruning the ones that
    /// fail. Delivery never blocks.
    pub fn publish(&self, event: &DomainEvent) {
        let failed: Vec<SubscriberId> = {
            let subscribers = self.subscribers.read();
            subscribers
                .iter()
                .filter_map(|(id, sink)| match sink.send(event.clone()) {
                    Ok(()) => None,
                    Err(SinkClosed(reason)) => {
                        tracing::warn!(subscriber_id = %id, reason = %reason, "Pruning subscriber");
                        Some(*id)
                    }
                })
                .collect()
        };
        for id in failed {
            self.remove(id);
        }
    }

    /// Close and detach every sink. Used at session teardown.
    pub fn close_all(&self) {
        let drained: Vec<Arc<dyn EventSink>> =
            self.subscribers.write().drain().map(|(_, sink)| sink).collect();
        for sink in drained {
            sink.close();
        }
    }
}

// =============================================================================
// Channel Sink
// =============================================================================

/// [`EventSink`] backed by a bounded tokio channel.
///
/// `send` uses `try_send`, so a consumer that stops draining its channel
/// fills the buffer and gets pruned rather than stalling the fan-out.
pub struct ChannelSink {
    sender: Mutex<Option<mpsc::Sender<DomainEvent>>>,
}

impl ChannelSink {
    /// Create a sink and the receiver its subscriber drains.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender: Mutex::new(Some(sender)),
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: DomainEvent) -> Result<(), SinkClosed> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(SinkClosed("sink closed".to_string()));
        };
        sender.try_send(event).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => SinkClosed("subscriber buffer full".to_string()),
            mpsc::error::TrySendError::Closed(_) => SinkClosed("receiver dropped".to_string()),
        })
    }

    fn close(&self) {
        // Dropping the sender ends the receiver's stream.
        self.sender.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::StreamErrorEvent;

    fn event(message: &str) -> DomainEvent {
        DomainEvent::StreamError(StreamErrorEvent {
            message: message.to_string(),
        })
    }

    #[test]
    fn publishes_to_every_subscriber() {
        let broadcaster = Broadcaster::new();
        let (sink_a, mut rx_a) = ChannelSink::new(4);
        let (sink_b, mut rx_b) = ChannelSink::new(4);
        broadcaster.add(Arc::new(sink_a));
        broadcaster.add(Arc::new(sink_b));

        broadcaster.publish(&event("one"));

        assert_eq!(rx_a.try_recv().unwrap(), event("one"));
        assert_eq!(rx_b.try_recv().unwrap(), event("one"));
    }

    #[test]
    fn full_subscriber_is_pruned_without_affecting_others() {
        let broadcaster = Broadcaster::new();
        let (slow, _slow_rx) = ChannelSink::new(1);
        let (healthy, mut healthy_rx) = ChannelSink::new(4);
        broadcaster.add(Arc::new(slow));
        broadcaster.add(Arc::new(healthy));

        // First publish fills the slow sink's single-slot buffer.
        broadcaster.publish(&event("one"));
        assert_eq!(broadcaster.subscriber_count(), 2);

        // Second publish overflows it; only the slow sink is pruned.
        broadcaster.publish(&event("two"));
        assert_eq!(broadcaster.subscriber_count(), 1);

        assert_eq!(healthy_rx.try_recv().unwrap(), event("one"));
        assert_eq!(healthy_rx.try_recv().unwrap(), event("two"));
    }

    #[test]
    fn dropped_receiver_is_pruned_on_next_publish() {
        let broadcaster = Broadcaster::new();
        let (sink, rx) = ChannelSink::new(4);
        broadcaster.add(Arc::new(sink));
        drop(rx);

        broadcaster.publish(&event("one"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn remove_closes_the_sink() {
        let broadcaster = Broadcaster::new();
        let (sink, mut rx) = ChannelSink::new(4);
        let id = broadcaster.add(Arc::new(sink));

        assert!(broadcaster.remove(id));
        assert!(!broadcaster.remove(id));
        assert!(rx.try_recv().is_err());
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn close_all_ends_every_receiver() {
        let broadcaster = Broadcaster::new();
        let (sink_a, mut rx_a) = ChannelSink::new(4);
        let (sink_b, mut rx_b) = ChannelSink::new(4);
        broadcaster.add(Arc::new(sink_a));
        broadcaster.add(Arc::new(sink_b));

        broadcaster.close_all();

        assert_eq!(broadcaster.subscriber_count(), 0);
        assert!(rx_a.blocking_recv().is_none());
        assert!(rx_b.blocking_recv().is_none());
    }

    #[test]
    fn subscriber_ids_are_unique() {
        let broadcaster = Broadcaster::new();
        let (sink_a, _rx_a) = ChannelSink::new(1);
        let (sink_b, _rx_b) = ChannelSink::new(1);

        let a = broadcaster.add(Arc::new(sink_a));
        let b = broadcaster.add(Arc::new(sink_b));
        assert_ne!(a, b);
    }
}
