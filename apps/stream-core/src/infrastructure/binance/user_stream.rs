//! Binance User-Data Stream Connector
//!
//! [`UserStreamConnector`] adapter for the listen-key flow: obtain a listen
//! key over REST, open the WebSocket for it, and pump raw frames into the
//! session's channel. A background task answers pings, refreshes the listen
//! key on a fixed cadence and deletes it once the connection is closed.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    RawStreamMessage, StreamConnectError, UserStreamConnection, UserStreamConnector,
};
use crate::domain::identity::{StreamCredentials, TradingIdentity};
use crate::infrastructure::config::Endpoints;

use super::messages::ListenKeyReply;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Listen-key based user-data stream connector.
pub struct BinanceUserStreamConnector {
    http: reqwest::Client,
    endpoints: Endpoints,
    keepalive_interval: Duration,
    message_buffer: usize,
}

impl BinanceUserStreamConnector {
    /// Create a connector with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if the HTTP client cannot be built.
    pub fn new(
        endpoints: Endpoints,
        keepalive_interval: Duration,
        message_buffer: usize,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoints,
            keepalive_interval,
            message_buffer,
        })
    }

    async fn obtain_listen_key(
        &self,
        credentials: &StreamCredentials,
    ) -> Result<String, StreamConnectError> {
        let response = self
            .http
            .post(self.endpoints.listen_key_url())
            .header(API_KEY_HEADER, credentials.api_key())
            .send()
            .await
            .map_err(|error| StreamConnectError::Transport(error.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let reply: ListenKeyReply = response
                    .json()
                    .await
                    .map_err(|error| StreamConnectError::Transport(error.to_string()))?;
                Ok(reply.listen_key)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                StreamConnectError::AuthRejected(format!("listen key refused: {}", response.status())),
            ),
            status => Err(StreamConnectError::Transport(format!(
                "listen key request failed: {status}"
            ))),
        }
    }
}

#[async_trait]
impl UserStreamConnector for BinanceUserStreamConnector {
    async fn connect(
        &self,
        identity: &TradingIdentity,
        credentials: &StreamCredentials,
    ) -> Result<UserStreamConnection, StreamConnectError> {
        let listen_key = self.obtain_listen_key(credentials).await?;
        let url = self.endpoints.user_stream_url(&listen_key);

        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|error| StreamConnectError::Transport(error.to_string()))?;
        tracing::info!(identity = %identity, "User-data stream connected");

        let (messages_tx, messages_rx) = mpsc::channel(self.message_buffer);
        let closer = CancellationToken::new();

        tokio::spawn(pump(
            identity.clone(),
            ws,
            messages_tx,
            closer.clone(),
            KeepAlive {
                http: self.http.clone(),
                url: self.endpoints.listen_key_url(),
                api_key: credentials.api_key().to_string(),
                listen_key,
                interval: self.keepalive_interval,
            },
        ));

        Ok(UserStreamConnection {
            messages: messages_rx,
            closer,
        })
    }
}

struct KeepAlive {
    http: reqwest::Client,
    url: String,
    api_key: String,
    listen_key: String,
    interval: Duration,
}

impl KeepAlive {
    /// Refresh the listen key's 60-minute validity window.
    async fn refresh(&self) {
        let result = self
            .http
            .put(format!("{}?listenKey={}", self.url, self.listen_key))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Listen key refreshed");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Listen key refresh refused");
            }
            Err(error) => {
                tracing::warn!(error = %error, "Listen key refresh failed");
            }
        }
    }

    /// Best-effort listen key deletion at shutdown.
    async fn delete(&self) {
        let result = self
            .http
            .delete(format!("{}?listenKey={}", self.url, self.listen_key))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await;
        if let Err(error) = result {
            tracing::debug!(error = %error, "Listen key deletion failed");
        }
    }
}

/// Pump frames off the WebSocket into the session's raw channel until the
/// upstream ends, the session cancels, or the session drops its receiver.
async fn pump(
    identity: TradingIdentity,
    mut ws: WsStream,
    messages: mpsc::Sender<RawStreamMessage>,
    closer: CancellationToken,
    keepalive: KeepAlive,
) {
    let start = tokio::time::Instant::now() + keepalive.interval;
    let mut refresh = tokio::time::interval_at(start, keepalive.interval);

    loop {
        tokio::select! {
            () = closer.cancelled() => break,
            _ = refresh.tick() => keepalive.refresh().await,
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(payload))) => {
                    if messages.send(RawStreamMessage::Payload(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(error) = ws.send(Message::Pong(payload)).await {
                        tracing::warn!(identity = %identity, error = %error, "Pong failed");
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "upstream closed".to_string(),
                        |f| format!("upstream closed: {}", f.reason),
                    );
                    let _ = messages.send(RawStreamMessage::Terminated(reason)).await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    let _ = messages
                        .send(RawStreamMessage::Terminated(error.to_string()))
                        .await;
                    break;
                }
                None => {
                    let _ = messages
                        .send(RawStreamMessage::Terminated("upstream ended".to_string()))
                        .await;
                    break;
                }
            },
        }
    }

    let _ = ws.close(None).await;
    keepalive.delete().await;
    tracing::info!(identity = %identity, "User-data stream pump stopped");
}
