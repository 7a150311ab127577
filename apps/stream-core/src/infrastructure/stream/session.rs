//! Stream Session
//!
//! One live upstream user-data connection for one trading identity. A
//! session runs two tasks:
//!
//! - the **decode task** drains raw upstream messages, decodes them and
//!   forwards consumable events into a bounded channel;
//! - the **fan-out task** drains that channel, publishes every event to
//!   the broadcaster and then hands terminal fills to the trade recorder.
//!
//! Malformed payloads are logged and skipped. When the upstream terminates
//! without recovery, exactly one stream-error event is published before the
//! session's subscribers are closed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{RawStreamMessage, TradeRecorder, UserStreamConnection};
use crate::domain::events::{DomainEvent, StreamErrorEvent};
use crate::domain::identity::TradingIdentity;
use crate::infrastructure::binance::codec::{self, Decoded};

use super::broadcast::Broadcaster;

/// Per-session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the decoded-event channel between the two tasks.
    pub event_channel_capacity: usize,
    /// How long `stop` waits for the tasks before abandoning them.
    pub teardown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 256,
            teardown_timeout: Duration::from_secs(5),
        }
    }
}

/// One running upstream session.
pub struct StreamSession {
    identity: TradingIdentity,
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
    upstream_closer: CancellationToken,
    decode_task: JoinHandle<()>,
    fanout_task: JoinHandle<()>,
    teardown_timeout: Duration,
}

impl StreamSession {
    /// Spawn the session's tasks over an already-open upstream connection.
    #[must_use]
    pub fn spawn(
        identity: TradingIdentity,
        connection: UserStreamConnection,
        broadcaster: Arc<Broadcaster>,
        recorder: Option<Arc<dyn TradeRecorder>>,
        config: &SessionConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);

        let decode_task = tokio::spawn(decode_loop(
            identity.clone(),
            connection.messages,
            events_tx,
            cancel.clone(),
        ));
        let fanout_task = tokio::spawn(fanout_loop(
            identity.clone(),
            events_rx,
            Arc::clone(&broadcaster),
            recorder,
        ));

        Self {
            identity,
            broadcaster,
            cancel,
            upstream_closer: connection.closer,
            decode_task,
            fanout_task,
            teardown_timeout: config.teardown_timeout,
        }
    }

    /// The session's fan-out, where subscriber sinks attach.
    #[must_use]
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Whether the upstream side of this session has ended.
    ///
    /// A terminated session never produces another event; the registry
    /// replaces it on the next attach instead of handing it out.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.decode_task.is_finished()
    }

    /// Stop the session: close the upstream, drain the tasks and close
    /// every remaining subscriber.
    ///
    /// Bounded by the teardown timeout; a task that fails to finish in
    /// time is abandoned with a warning rather than awaited forever.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.upstream_closer.cancel();

        let drained = tokio::time::timeout(self.teardown_timeout, async {
            let _ = self.decode_task.await;
            let _ = self.fanout_task.await;
        })
        .await;

        if drained.is_err() {
            tracing::warn!(identity = %self.identity, "Session teardown timed out; abandoning tasks");
        }
        // Safety net for the timeout path; close_all is idempotent.
        self.broadcaster.close_all();
        tracing::info!(identity = %self.identity, "Session stopped");
    }
}

/// Drain raw upstream messages into decoded events.
async fn decode_loop(
    identity: TradingIdentity,
    mut messages: mpsc::Receiver<RawStreamMessage>,
    events: mpsc::Sender<DomainEvent>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break,
            message = messages.recv() => message,
        };
        match message {
            Some(RawStreamMessage::Payload(payload)) => match codec::decode(&payload) {
                Ok(Decoded::Event(event)) => {
                    // An in-band error frame is terminal for the session.
                    let terminal = matches!(event, DomainEvent::StreamError(_));
                    if events.send(event).await.is_err() {
                        break;
                    }
                    if terminal {
                        tracing::error!(identity = %identity, "Upstream reported a stream error");
                        break;
                    }
                }
                Ok(Decoded::Skipped) => {}
                Err(error) => {
                    tracing::warn!(identity = %identity, error = %error, "Skipping undecodable payload");
                }
            },
            Some(RawStreamMessage::Terminated(reason)) => {
                tracing::error!(identity = %identity, reason = %reason, "Upstream stream terminated");
                let event = DomainEvent::StreamError(StreamErrorEvent { message: reason });
                let _ = events.send(event).await;
                break;
            }
            // Clean upstream close, nothing further to decode.
            None => break,
        }
    }
}

/// Drain decoded events: fan out to subscribers first, then forward
/// terminal fills to the recorder. A slow recorder must never delay
/// delivery to subscribers.
async fn fanout_loop(
    identity: TradingIdentity,
    mut events: mpsc::Receiver<DomainEvent>,
    broadcaster: Arc<Broadcaster>,
    recorder: Option<Arc<dyn TradeRecorder>>,
) {
    // At-most-once fill forwarding per session, keyed by order id.
    let mut recorded: HashSet<String> = HashSet::new();

    while let Some(event) = events.recv().await {
        broadcaster.publish(&event);

        if let Some(fill) = event.as_terminal_fill() {
            if recorded.insert(fill.exchange_order_id.clone()) {
                if let Some(recorder) = &recorder {
                    if let Err(error) = recorder.record_fill(&fill).await {
                        tracing::warn!(
                            identity = %identity,
                            order_id = %fill.exchange_order_id,
                            error = %error,
                            "Failed to record fill"
                        );
                    }
                }
            }
        }
    }
    broadcaster.close_all();
}
