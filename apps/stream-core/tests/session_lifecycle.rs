//! End-to-end session lifecycle over the public API: lazy start on first
//! attach, shared fan-out, prune isolation, refcounted teardown and clean
//! reattach.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use stream_core::{
    ChannelSink, DomainEvent, InMemoryTradeRecorder, RawStreamMessage, SessionConfig,
    SessionRegistry, StreamConnectError, StreamCredentials, TradeRecorder, TradingIdentity,
    UserStreamConnection, UserStreamConnector,
};

/// In-memory stand-in for the exchange's user-data stream.
#[derive(Default)]
struct FakeExchange {
    connects: AtomicUsize,
    taps: parking_lot::Mutex<Vec<mpsc::Sender<RawStreamMessage>>>,
    closers: parking_lot::Mutex<Vec<CancellationToken>>,
}

impl FakeExchange {
    async fn push(&self, connection_index: usize, payload: &str) {
        let tap = self.taps.lock()[connection_index].clone();
        tap.send(RawStreamMessage::Payload(payload.to_string()))
            .await
            .unwrap();
    }
}

#[async_trait]
impl UserStreamConnector for FakeExchange {
    async fn connect(
        &self,
        _identity: &TradingIdentity,
        _credentials: &StreamCredentials,
    ) -> Result<UserStreamConnection, StreamConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(32);
        let closer = CancellationToken::new();
        self.taps.lock().push(tx);
        self.closers.lock().push(closer.clone());
        Ok(UserStreamConnection {
            messages: rx,
            closer,
        })
    }
}

fn filled_report(order_id: i64) -> String {
    format!(
        r#"{{
            "e": "executionReport", "E": 1700000000000, "s": "BTCUSDT",
            "c": "run-0", "S": "BUY", "o": "MARKET", "f": "GTC",
            "q": "0.00100000", "p": "0.00000000", "X": "FILLED",
            "i": {order_id}, "l": "0.00100000", "z": "0.00100000",
            "L": "64000.00000000", "n": "0.00000100", "N": "BTC",
            "T": 1700000000001, "O": 1700000000000
        }}"#
    )
}

fn credentials() -> StreamCredentials {
    StreamCredentials::new("key".to_string(), "secret".to_string())
}

#[tokio::test]
async fn full_lifecycle_attach_stream_record_release_reattach() {
    let exchange = Arc::new(FakeExchange::default());
    let recorder = Arc::new(InMemoryTradeRecorder::new());
    let registry = SessionRegistry::new(
        exchange.clone(),
        Some(recorder.clone() as Arc<dyn TradeRecorder>),
        SessionConfig::default(),
    );
    let identity = TradingIdentity::new("user-1");

    // Two subscribers share one upstream connection.
    let (sink_a, mut rx_a) = ChannelSink::new(8);
    let (sink_b, mut rx_b) = ChannelSink::new(8);
    let handle_a = registry
        .attach(&identity, &credentials(), Arc::new(sink_a))
        .await
        .unwrap();
    let handle_b = registry
        .attach(&identity, &credentials(), Arc::new(sink_b))
        .await
        .unwrap();
    assert_eq!(exchange.connects.load(Ordering::SeqCst), 1);

    // One upstream fill reaches both subscribers and the recorder.
    exchange.push(0, &filled_report(42)).await;
    for rx in [&mut rx_a, &mut rx_b] {
        let DomainEvent::OrderUpdate(update) = rx.recv().await.unwrap() else {
            panic!("expected order update");
        };
        assert_eq!(update.exchange_order_id, "42");
    }
    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.fill("42").unwrap().symbol, "BTCUSDT");

    // First release keeps the session; the last one closes the upstream.
    registry.release(handle_a).await;
    assert!(!exchange.closers.lock()[0].is_cancelled());
    registry.release(handle_b).await;
    assert!(exchange.closers.lock()[0].is_cancelled());
    assert!(rx_b.recv().await.is_none());

    // Reattach starts a fresh connection that is live end to end.
    let (sink_c, mut rx_c) = ChannelSink::new(8);
    let handle_c = registry
        .attach(&identity, &credentials(), Arc::new(sink_c))
        .await
        .unwrap();
    assert_eq!(exchange.connects.load(Ordering::SeqCst), 2);

    exchange.push(1, &filled_report(43)).await;
    assert!(matches!(
        rx_c.recv().await.unwrap(),
        DomainEvent::OrderUpdate(_)
    ));
    assert_eq!(recorder.len(), 2);

    registry.release(handle_c).await;
}

#[tokio::test]
async fn slow_subscriber_is_pruned_without_breaking_the_stream() {
    let exchange = Arc::new(FakeExchange::default());
    let recorder = Arc::new(InMemoryTradeRecorder::new());
    let registry = SessionRegistry::new(
        exchange.clone(),
        Some(recorder.clone() as Arc<dyn TradeRecorder>),
        SessionConfig::default(),
    );
    let identity = TradingIdentity::new("user-1");

    let (slow, slow_rx) = ChannelSink::new(1);
    let (healthy, mut healthy_rx) = ChannelSink::new(8);
    let slow_handle = registry
        .attach(&identity, &credentials(), Arc::new(slow))
        .await
        .unwrap();
    let healthy_handle = registry
        .attach(&identity, &credentials(), Arc::new(healthy))
        .await
        .unwrap();
    drop(slow_rx);

    // Several fills in a row; the slow sink dies, the healthy one gets all.
    for order_id in 1..=3 {
        exchange.push(0, &filled_report(order_id)).await;
        let DomainEvent::OrderUpdate(update) = healthy_rx.recv().await.unwrap() else {
            panic!("expected order update");
        };
        assert_eq!(update.exchange_order_id, order_id.to_string());
    }
    assert_eq!(recorder.len(), 3);

    // Pruning is not release; both handles are still owed one.
    registry.release(slow_handle).await;
    assert!(!exchange.closers.lock()[0].is_cancelled());
    registry.release(healthy_handle).await;
    assert!(exchange.closers.lock()[0].is_cancelled());
}

#[tokio::test]
async fn upstream_failure_notifies_subscribers_once_and_allows_recovery() {
    let exchange = Arc::new(FakeExchange::default());
    let registry = SessionRegistry::new(exchange.clone(), None, SessionConfig::default());
    let identity = TradingIdentity::new("user-1");

    let (sink, mut rx) = ChannelSink::new(8);
    let stale = registry
        .attach(&identity, &credentials(), Arc::new(sink))
        .await
        .unwrap();

    let tap = exchange.taps.lock()[0].clone();
    tap.send(RawStreamMessage::Terminated("connection reset".to_string()))
        .await
        .unwrap();

    let DomainEvent::StreamError(error) = rx.recv().await.unwrap() else {
        panic!("expected stream error");
    };
    assert_eq!(error.message, "connection reset");
    assert!(rx.recv().await.is_none());

    // A new attach recovers with a fresh upstream connection.
    let (sink, mut rx) = ChannelSink::new(8);
    let fresh = registry
        .attach(&identity, &credentials(), Arc::new(sink))
        .await
        .unwrap();
    assert_eq!(exchange.connects.load(Ordering::SeqCst), 2);

    exchange.push(1, &filled_report(7)).await;
    assert!(matches!(
        rx.recv().await.unwrap(),
        DomainEvent::OrderUpdate(_)
    ));

    // Releasing the dead session's handle must not touch the fresh one.
    registry.release(stale).await;
    assert_eq!(registry.active_sessions(), 1);
    registry.release(fresh).await;
    assert_eq!(registry.active_sessions(), 0);
}
