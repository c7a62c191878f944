//! Socket.IO client over a tokio-tungstenite WebSocket

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message},
};
use tracing::{debug, error, info, warn};

use super::codec::{ENGINE_IO_VERSION, EnginePacket, SocketPacket};
use super::types::{ClientRequest, ConnectionStatus, InboundEvent, ProtocolError, ServerEvent};
use crate::config::ServerConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Upper bound for a single backoff delay
const MAX_RECONNECT_INTERVAL: Duration = Duration::from_secs(30);

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("not connected to the server")]
    NotConnected,
    #[error("send failed: {0}")]
    Send(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reconnection behaviour for the connection task
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    pub initial_interval: Duration,
    pub max_attempts: u32,
    pub connect_timeout: Duration,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1000),
            max_attempts: 10,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ServerConfig> for ReconnectSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.reconnect_interval_ms),
            max_attempts: config.max_reconnect_attempts.max(1),
            connect_timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// Derive the Socket.IO WebSocket endpoint from a server URL
///
/// `http://host:5008` becomes `ws://host:5008/socket.io/?EIO=4&transport=websocket`.
/// URLs that already name a `/socket.io` path are only re-schemed.
pub fn endpoint_for(url: &str) -> Result<String, ChannelError> {
    let url = url.trim().trim_end_matches('/');
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| ChannelError::InvalidUrl(format!("missing scheme in '{}'", url)))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChannelError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            )));
        }
    };

    if rest.is_empty() {
        return Err(ChannelError::InvalidUrl(format!("missing host in '{}'", url)));
    }

    if rest.contains("/socket.io") {
        Ok(format!("{}://{}", ws_scheme, rest))
    } else {
        Ok(format!(
            "{}://{}/socket.io/?EIO={}&transport=websocket",
            ws_scheme, rest, ENGINE_IO_VERSION
        ))
    }
}

/// Persistent Socket.IO channel to the orchestrator
pub struct SocketIoClient {
    endpoint: String,
    settings: ReconnectSettings,
    status_tx: watch::Sender<ConnectionStatus>,
    status_rx: watch::Receiver<ConnectionStatus>,
    writer: Arc<Mutex<Option<WsWriter>>>,
    event_tx: mpsc::Sender<InboundEvent>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SocketIoClient {
    /// Create a new client; inbound events are delivered on the returned receiver
    pub fn new(
        url: &str,
        settings: ReconnectSettings,
    ) -> Result<(Self, mpsc::Receiver<InboundEvent>), ChannelError> {
        let endpoint = endpoint_for(url)?;
        let (event_tx, event_rx) = mpsc::channel(256);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let client = Self {
            endpoint,
            settings,
            status_tx,
            status_rx,
            writer: Arc::new(Mutex::new(None)),
            event_tx,
            shutdown_tx: None,
            task: None,
        };

        Ok((client, event_rx))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get current connection status
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch connection status transitions
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Check if the namespace is currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self.status(), ConnectionStatus::Connected)
    }

    /// Spawn the connection task; it connects, reconnects and pumps inbound frames
    pub fn start(&mut self) {
        if self.task.is_some() {
            debug!("Connection task already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx);

        let task = ConnectionTask {
            endpoint: self.endpoint.clone(),
            settings: self.settings.clone(),
            writer: self.writer.clone(),
            event_tx: self.event_tx.clone(),
            status_tx: self.status_tx.clone(),
        };

        info!("Starting Socket.IO connection task for {}", self.endpoint);
        self.task = Some(tokio::spawn(task.run(shutdown_rx)));
    }

    /// Emit a request as a Socket.IO event
    pub async fn emit(&self, request: &ClientRequest) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }

        let packet = SocketPacket::Event {
            name: request.event_name().to_string(),
            payload: request.payload()?,
        };
        write_frame(&self.writer, packet.frame()).await?;
        debug!("Emitted {}", request.event_name());
        Ok(())
    }

    /// Gracefully stop the connection task and close the socket
    pub async fn shutdown(&mut self) -> Result<(), ChannelError> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            if let Err(e) = shutdown_tx.send(()).await {
                warn!("Failed to send shutdown signal: {}", e);
            }
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Connection task terminated with error: {}", e);
            }
        }

        let _ = self.status_tx.send(ConnectionStatus::Disconnected);
        info!("Socket.IO client shutdown completed");
        Ok(())
    }
}

/// Next WebSocket message, or `Err` once the heartbeat window elapses in silence
async fn next_message(
    reader: &mut WsReader,
    watchdog: Option<Duration>,
) -> Result<Option<Result<Message, tungstenite::Error>>, tokio::time::error::Elapsed> {
    match watchdog {
        Some(limit) => tokio::time::timeout(limit, reader.next()).await,
        None => Ok(reader.next().await),
    }
}

async fn write_frame(writer: &Mutex<Option<WsWriter>>, frame: String) -> Result<(), ChannelError> {
    let mut guard = writer.lock().await;
    match guard.as_mut() {
        Some(sink) => sink
            .send(Message::Text(frame))
            .await
            .map_err(|e| ChannelError::Send(e.to_string())),
        None => Err(ChannelError::NotConnected),
    }
}

/// Why a single connection ended
#[derive(Debug)]
enum Exit {
    Shutdown,
    Closed(String),
}

/// State moved into the spawned connection task
struct ConnectionTask {
    endpoint: String,
    settings: ReconnectSettings,
    writer: Arc<Mutex<Option<WsWriter>>>,
    event_tx: mpsc::Sender<InboundEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ConnectionTask {
    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut connected_before = false;

        loop {
            let _ = self.status_tx.send(if connected_before {
                ConnectionStatus::Reconnecting
            } else {
                ConnectionStatus::Connecting
            });

            let stream = tokio::select! {
                result = self.connect_with_backoff() => result,
                _ = shutdown_rx.recv() => break,
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Giving up on {}: {}", self.endpoint, e);
                    let _ = self.status_tx.send(ConnectionStatus::Error(e.to_string()));
                    let _ = self
                        .event_tx
                        .send(InboundEvent::Disconnect {
                            reason: e.to_string(),
                        })
                        .await;
                    return;
                }
            };

            let (sink, mut reader) = stream.split();
            *self.writer.lock().await = Some(sink);

            let mut announced = false;
            let exit = self.pump(&mut reader, &mut shutdown_rx, &mut announced).await;

            if let Some(mut sink) = self.writer.lock().await.take() {
                if let Err(e) = sink.close().await {
                    debug!("Error closing WebSocket sink: {}", e);
                }
            }
            let _ = self.status_tx.send(ConnectionStatus::Disconnected);
            connected_before |= announced;

            match exit {
                Exit::Shutdown => {
                    info!("Connection task stopped");
                    break;
                }
                Exit::Closed(reason) => {
                    warn!("Socket.IO connection closed: {}", reason);
                    if announced {
                        let _ = self
                            .event_tx
                            .send(InboundEvent::Disconnect { reason })
                            .await;
                    }
                }
            }
        }
    }

    async fn connect_with_backoff(&self) -> Result<WsStream, ChannelError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.settings.initial_interval)
            .with_max_interval(MAX_RECONNECT_INTERVAL)
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let endpoint = self.endpoint.as_str();
        let max_attempts = self.settings.max_attempts;
        let timeout = self.settings.connect_timeout;

        backoff::future::retry(policy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("Connecting to {} (attempt {}/{})", endpoint, attempt, max_attempts);

            let error = match tokio::time::timeout(timeout, connect_async(endpoint)).await {
                Ok(Ok((stream, _))) => {
                    info!("WebSocket open at {} after {} attempt(s)", endpoint, attempt);
                    return Ok(stream);
                }
                Ok(Err(e)) => ChannelError::Connect(e.to_string()),
                Err(_) => ChannelError::Timeout(timeout),
            };

            warn!("Connection attempt {} failed: {}", attempt, error);
            if attempt >= max_attempts {
                Err(backoff::Error::permanent(error))
            } else {
                Err(backoff::Error::transient(error))
            }
        })
        .await
    }

    async fn pump(
        &self,
        reader: &mut WsReader,
        shutdown_rx: &mut mpsc::Receiver<()>,
        announced: &mut bool,
    ) -> Exit {
        // Armed by the open handshake: the server must ping within interval + timeout
        let mut watchdog: Option<Duration> = None;

        loop {
            tokio::select! {
                message = next_message(reader, watchdog) => {
                    let Ok(message) = message else {
                        return Exit::Closed(format!(
                            "no heartbeat from the server for {:?}",
                            watchdog.unwrap_or_default()
                        ));
                    };
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let exit = self.handle_frame(&text, announced, &mut watchdog).await;
                            if let Some(exit) = exit {
                                return exit;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "close frame received".to_string());
                            return Exit::Closed(reason);
                        }
                        Some(Ok(_)) => {
                            debug!("Ignoring non-text WebSocket frame");
                        }
                        Some(Err(e)) => {
                            return Exit::Closed(format!("WebSocket error: {}", e));
                        }
                        None => return Exit::Closed("stream ended".to_string()),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    if *announced {
                        let _ = write_frame(&self.writer, SocketPacket::Disconnect.frame()).await;
                    }
                    return Exit::Shutdown;
                }
            }
        }
    }

    /// Handle one text frame; returns an exit reason when the connection is over
    async fn handle_frame(
        &self,
        text: &str,
        announced: &mut bool,
        watchdog: &mut Option<Duration>,
    ) -> Option<Exit> {
        debug!("Received frame: {}", text);

        let packet = match EnginePacket::decode(text) {
            Ok(packet) => packet,
            Err(e) => return self.forward(InboundEvent::Rejected(e)).await,
        };

        match packet {
            EnginePacket::Open(handshake) => {
                debug!(
                    "Engine.IO session {} (ping interval {}ms, timeout {}ms)",
                    handshake.sid, handshake.ping_interval, handshake.ping_timeout
                );
                *watchdog = Some(Duration::from_millis(
                    handshake.ping_interval.saturating_add(handshake.ping_timeout),
                ));
                let connect = SocketPacket::Connect(serde_json::Value::Null).frame();
                if let Err(e) = write_frame(&self.writer, connect).await {
                    return Some(Exit::Closed(format!("namespace connect failed: {}", e)));
                }
                None
            }
            EnginePacket::Ping(data) => {
                if let Err(e) = write_frame(&self.writer, EnginePacket::Pong(data).encode()).await {
                    return Some(Exit::Closed(format!("heartbeat failed: {}", e)));
                }
                None
            }
            EnginePacket::Close => Some(Exit::Closed("server closed the session".to_string())),
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => None,
            EnginePacket::Message(body) => match SocketPacket::decode(&body) {
                Ok(SocketPacket::Connect(_)) => {
                    *announced = true;
                    let _ = self.status_tx.send(ConnectionStatus::Connected);
                    info!("Socket.IO namespace connected");
                    self.forward(InboundEvent::Connect).await
                }
                Ok(SocketPacket::Disconnect) => {
                    Some(Exit::Closed("server disconnected the namespace".to_string()))
                }
                Ok(SocketPacket::ConnectError(data)) => {
                    Some(Exit::Closed(format!("connect error: {}", data)))
                }
                Ok(SocketPacket::Ack) => None,
                Ok(SocketPacket::Event { name, payload }) => {
                    let event = match ServerEvent::decode(&name, payload) {
                        Ok(event) => InboundEvent::Server(event),
                        Err(e) => {
                            warn!("Rejected server event '{}': {}", name, e);
                            InboundEvent::Rejected(e)
                        }
                    };
                    self.forward(event).await
                }
                Err(e) => {
                    warn!("Rejected Socket.IO packet: {}", e);
                    self.forward(InboundEvent::Rejected(e)).await
                }
            },
        }
    }

    async fn forward(&self, event: InboundEvent) -> Option<Exit> {
        if self.event_tx.send(event).await.is_err() {
            // Nobody is listening anymore
            return Some(Exit::Shutdown);
        }
        None
    }
}
