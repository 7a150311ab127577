//! Session Registry
//!
//! Refcounted, lazily-started stream sessions keyed by trading identity.
//! The first attach for an identity opens the upstream connection; further
//! attaches share the live session; the release that drops the refcount to
//! zero tears it down. At most one live session per identity exists at any
//! instant, including across a teardown/reattach handover.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::application::ports::{EventSink, StreamConnectError, TradeRecorder, UserStreamConnector};
use crate::domain::identity::{StreamCredentials, TradingIdentity};

use super::broadcast::{Broadcaster, SubscriberId};
use super::session::{SessionConfig, StreamSession};

// =============================================================================
// Errors and Handles
// =============================================================================

/// Registry-level failure.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The upstream connection for a fresh session could not be opened.
    /// No session exists afterwards; a later attach retries from scratch.
    #[error("failed to open upstream stream: {0}")]
    Connect(#[from] StreamConnectError),
}

/// Proof of one attach, consumed by the matching release.
///
/// The handle pins the session generation it attached to, so releasing
/// after the session was replaced can never tear down the successor.
#[derive(Debug)]
pub struct SubscriptionHandle {
    identity: TradingIdentity,
    generation: u64,
    subscriber_id: SubscriberId,
}

impl SubscriptionHandle {
    /// The identity this subscription is attached to.
    #[must_use]
    pub fn identity(&self) -> &TradingIdentity {
        &self.identity
    }
}

// =============================================================================
// Registry
// =============================================================================

struct ActiveSession {
    generation: u64,
    refcount: usize,
    session: StreamSession,
}

/// Per-identity slot. The async gate serializes session start and stop for
/// one identity without blocking work on any other identity.
#[derive(Default)]
struct Slot {
    gate: AsyncMutex<Option<ActiveSession>>,
}

/// Refcounted one-session-per-identity lifecycle manager.
pub struct SessionRegistry {
    connector: Arc<dyn UserStreamConnector>,
    recorder: Option<Arc<dyn TradeRecorder>>,
    config: SessionConfig,
    // Slots are never removed; an identity's slot outlives its sessions so
    // concurrent attaches always race on the same gate.
    slots: parking_lot::Mutex<HashMap<TradingIdentity, Arc<Slot>>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    /// Create a registry.
    #[must_use]
    pub fn new(
        connector: Arc<dyn UserStreamConnector>,
        recorder: Option<Arc<dyn TradeRecorder>>,
        config: SessionConfig,
    ) -> Self {
        Self {
            connector,
            recorder,
            config,
            slots: parking_lot::Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Attach a subscriber to the identity's session, starting the
    /// upstream lazily on the first attach.
    ///
    /// Concurrent attaches for the same identity serialize on the
    /// identity's gate: exactly one opens the connection, the rest join
    /// the session it created. Credentials only matter when a session is
    /// actually started; while one is live, the existing session wins and
    /// later credentials are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Connect`] when the upstream connection
    /// cannot be opened; the registry state is unchanged.
    pub async fn attach(
        &self,
        identity: &TradingIdentity,
        credentials: &StreamCredentials,
        sink: Arc<dyn EventSink>,
    ) -> Result<SubscriptionHandle, RegistryError> {
        let slot = self.slot(identity);
        let mut active = slot.gate.lock().await;

        // A session whose upstream already ended is dead weight; replace it.
        if active.as_ref().is_some_and(|a| a.session.is_terminated()) {
            if let Some(dead) = active.take() {
                tracing::info!(identity = %identity, "Replacing terminated session");
                dead.session.stop().await;
            }
        }

        let mut session = match active.take() {
            Some(session) => session,
            None => {
                let connection = self.connector.connect(identity, credentials).await?;
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                tracing::info!(identity = %identity, generation, "Session started");
                ActiveSession {
                    generation,
                    refcount: 0,
                    session: StreamSession::spawn(
                        identity.clone(),
                        connection,
                        Arc::new(Broadcaster::new()),
                        self.recorder.clone(),
                        &self.config,
                    ),
                }
            }
        };

        session.refcount += 1;
        let subscriber_id = session.session.broadcaster().add(sink);
        let generation = session.generation;
        tracing::debug!(
            identity = %identity,
            refcount = session.refcount,
            subscriber_id = %subscriber_id,
            "Subscriber attached"
        );
        *active = Some(session);

        Ok(SubscriptionHandle {
            identity: identity.clone(),
            generation,
            subscriber_id,
        })
    }

    /// Release one subscription. The release that drops the session's
    /// refcount to zero stops it; the call returns only after teardown
    /// finished, so a subsequent attach starts from a clean slate.
    ///
    /// A handle from an already-replaced session is a no-op: the
    /// generation check stops it from touching the successor.
    pub async fn release(&self, handle: SubscriptionHandle) {
        let slot = self.slot(&handle.identity);
        let mut active = slot.gate.lock().await;

        let Some(session) = active.as_mut() else {
            tracing::debug!(identity = %handle.identity, "Release after teardown; ignoring");
            return;
        };
        if session.generation != handle.generation {
            tracing::debug!(
                identity = %handle.identity,
                "Release against a replaced session; ignoring"
            );
            return;
        }

        // The sink may already be gone if it was pruned; the refcount is
        // still owed a decrement either way.
        session.session.broadcaster().remove(handle.subscriber_id);
        session.refcount -= 1;
        tracing::debug!(
            identity = %handle.identity,
            refcount = session.refcount,
            "Subscriber released"
        );

        if session.refcount == 0 {
            if let Some(last) = active.take() {
                tracing::info!(identity = %handle.identity, "Last subscriber gone; stopping session");
                last.session.stop().await;
            }
        }
    }

    /// Number of identities with a live session. Test and introspection
    /// aid.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self.slots.lock().values().cloned().collect();
        slots
            .iter()
            .filter(|slot| {
                slot.gate
                    .try_lock()
                    .map_or(true, |active| active.is_some())
            })
            .count()
    }

    fn slot(&self, identity: &TradingIdentity) -> Arc<Slot> {
        Arc::clone(
            self.slots
                .lock()
                .entry(identity.clone())
                .or_default(),
        )
    }
}
