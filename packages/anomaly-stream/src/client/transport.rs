// Connection transports for the stream client
//
// A `Connector` opens a `Connection`: a scoped handle over a pair of channels
// (outbound requests, inbound events) and the task that drives the wire.
// Dropping the handle cancels that task, so every teardown path closes the
// connection.
//
// Implementations:
// - `WebSocketConnector`: Socket.IO over a tokio-tungstenite websocket
// - `ChannelConnector`: in-memory peer, for tests and embedding

use crate::client::event::{InboundEvent, OutboundMessage};
use crate::client::protocol::{EnginePacket, ProtocolError, SocketPacket, DEFAULT_NAMESPACE};
use crate::types::{StreamError, StreamResult};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Handle to one live connection
///
/// Closing is idempotent and also happens on drop.
pub struct Connection {
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    inbound: mpsc::UnboundedReceiver<InboundEvent>,
    cancel: CancellationToken,
}

impl Connection {
    pub fn new(
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        inbound: mpsc::UnboundedReceiver<InboundEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            outbound,
            inbound,
            cancel,
        }
    }

    /// Queue a request for the wire (fire-and-forget)
    pub fn send(&self, message: OutboundMessage) -> StreamResult<()> {
        if self.cancel.is_cancelled() {
            return Err(StreamError::ChannelClosed);
        }
        self.outbound
            .send(message)
            .map_err(|_| StreamError::ChannelClosed)
    }

    /// Next inbound event; `None` once the transport has gone away
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.inbound.recv().await
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens connections to the detection service
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, base_url: &str) -> StreamResult<Connection>;
}

/// Where a base URL points at on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct SocketEndpoint {
    pub url: Url,
    pub namespace: String,
}

impl SocketEndpoint {
    /// Derive the websocket endpoint from an `http(s)://host[:port][/namespace]` base URL
    pub fn from_base_url(base_url: &str) -> StreamResult<Self> {
        let mut url = Url::parse(base_url)
            .map_err(|e| StreamError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(StreamError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, base_url
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| StreamError::InvalidUrl(format!("cannot use {} for {}", scheme, base_url)))?;

        let path = url.path().trim_end_matches('/');
        let namespace = if path.is_empty() {
            DEFAULT_NAMESPACE.to_string()
        } else {
            path.to_string()
        };

        url.set_path("/socket.io/");
        url.set_query(Some("EIO=4&transport=websocket"));
        url.set_fragment(None);

        Ok(Self { url, namespace })
    }
}

/// Socket.IO client transport over a websocket
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, base_url: &str) -> StreamResult<Connection> {
        let endpoint = SocketEndpoint::from_base_url(base_url)?;
        if endpoint.url.scheme() == "wss" {
            // Fails only when a provider is already installed
            rustls::crypto::ring::default_provider()
                .install_default()
                .ok();
        }
        log::info!("Connecting to detection service: {}", endpoint.url);

        let (ws_stream, _) = connect_async(endpoint.url.as_str())
            .await
            .map_err(|e| StreamError::WebSocket(format!("Connection failed: {}", e)))?;

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(drive_socket(
            ws_stream,
            endpoint.namespace,
            out_rx,
            in_tx,
            cancel.clone(),
        ));

        Ok(Connection::new(out_tx, in_rx, cancel))
    }
}

enum Flow {
    Continue,
    Closed(String),
}

/// Run one websocket until it closes or the connection handle is cancelled
async fn drive_socket<S>(
    ws_stream: S,
    namespace: String,
    mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
    cancel: CancellationToken,
) where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    let closed_by_peer = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break None,

            request = outbound.recv() => {
                let Some(request) = request else { break None };
                let frame = match request.to_frame(&namespace) {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::error!("Dropping outbound {}: {}", request.event_name(), e);
                        continue;
                    }
                };
                log::debug!("-> {}", frame);
                if let Err(e) = write.send(Message::Text(frame.into())).await {
                    break Some(format!("transport error: {}", e));
                }
            }

            message = read.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break Some("transport close".to_string()),
                    Some(Ok(Message::Binary(_))) => {
                        log::warn!("Received binary websocket message (not supported)");
                        continue;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Some(format!("transport error: {}", e)),
                };

                let mut replies = Vec::new();
                let flow = handle_frame(text.as_str(), &namespace, &inbound, &mut replies);
                for reply in replies {
                    if let Err(e) = write.send(Message::Text(reply.into())).await {
                        log::warn!("Failed to reply to server: {}", e);
                    }
                }
                if let Flow::Closed(reason) = flow {
                    break Some(reason);
                }
                if inbound.is_closed() {
                    break None;
                }
            }
        }
    };

    match closed_by_peer {
        Some(reason) => {
            log::info!("Connection to detection service lost: {}", reason);
            inbound.send(InboundEvent::Disconnected { reason }).ok();
        }
        None => {
            let goodbye = SocketPacket::Disconnect {
                namespace: namespace.clone(),
            };
            write.send(Message::Text(goodbye.encode().into())).await.ok();
            write.close().await.ok();
            log::debug!("Websocket closed by client");
        }
    }
}

/// Handle one Engine.IO frame, collecting any frames to send back
fn handle_frame(
    frame: &str,
    namespace: &str,
    inbound: &mpsc::UnboundedSender<InboundEvent>,
    replies: &mut Vec<String>,
) -> Flow {
    let packet = match EnginePacket::decode(frame) {
        Ok(packet) => packet,
        Err(e @ ProtocolError::Handshake(_)) => {
            log::error!("Rejecting Engine.IO open: {}", e);
            return Flow::Closed("invalid handshake".to_string());
        }
        Err(e) => {
            log::warn!("Dropping malformed frame: {}", e);
            return Flow::Continue;
        }
    };

    match packet {
        EnginePacket::Open(handshake) => {
            log::debug!(
                "Engine.IO open: sid={} ping={}ms",
                handshake.sid,
                handshake.ping_interval
            );
            replies.push(
                SocketPacket::Connect {
                    namespace: namespace.to_string(),
                    payload: None,
                }
                .encode(),
            );
        }
        EnginePacket::Ping(data) => replies.push(EnginePacket::Pong(data).encode()),
        EnginePacket::Close => return Flow::Closed("transport close".to_string()),
        EnginePacket::Message(body) => return handle_socket_packet(&body, namespace, inbound),
        EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
    }

    Flow::Continue
}

fn handle_socket_packet(
    body: &str,
    namespace: &str,
    inbound: &mpsc::UnboundedSender<InboundEvent>,
) -> Flow {
    let packet = match SocketPacket::decode(body) {
        Ok(packet) => packet,
        Err(e) => {
            log::warn!("Dropping malformed packet: {}", e);
            return Flow::Continue;
        }
    };

    if packet.namespace() != namespace {
        log::debug!("Ignoring packet for namespace {}", packet.namespace());
        return Flow::Continue;
    }

    match packet {
        SocketPacket::Connect { .. } => {
            inbound.send(InboundEvent::Connected).ok();
        }
        SocketPacket::Disconnect { .. } => {
            return Flow::Closed("io server disconnect".to_string());
        }
        SocketPacket::ConnectError { payload, .. } => {
            let detail = payload.map(|p| p.to_string()).unwrap_or_default();
            return Flow::Closed(format!("connect error {}", detail));
        }
        SocketPacket::Event { name, args, .. } => match InboundEvent::from_socket_event(&name, args) {
            Ok(Some(event)) => {
                inbound.send(event).ok();
            }
            Ok(None) => log::debug!("Ignoring unknown event '{}'", name),
            Err(e) => log::warn!("Dropping inbound event: {}", e),
        },
        SocketPacket::Ack { ack_id, .. } => log::debug!("Ignoring ack {:?}", ack_id),
        SocketPacket::Binary { .. } => log::warn!("Dropping binary packet (not supported)"),
    }

    Flow::Continue
}

/// The far side of a `ChannelConnector` connection
pub struct ChannelPeer {
    inbound: mpsc::UnboundedSender<InboundEvent>,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    cancel: CancellationToken,
    pub base_url: String,
}

impl ChannelPeer {
    /// Deliver an event to the client
    pub fn emit(&self, event: InboundEvent) -> bool {
        self.inbound.send(event).is_ok()
    }

    /// Deliver a raw Engine.IO frame, decoded the same way the websocket
    /// transport decodes it
    pub fn emit_frame(&self, frame: &str) {
        let mut replies = Vec::new();
        if let Flow::Closed(reason) = handle_frame(frame, DEFAULT_NAMESPACE, &self.inbound, &mut replies) {
            self.inbound.send(InboundEvent::Disconnected { reason }).ok();
        }
    }

    /// Everything the client has sent so far
    pub fn drain_sent(&mut self) -> Vec<OutboundMessage> {
        let mut sent = Vec::new();
        while let Ok(message) = self.outbound.try_recv() {
            sent.push(message);
        }
        sent
    }

    /// Whether the client side closed the connection
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// In-memory connector; each `open` creates a peer the caller can drive
#[derive(Clone, Default)]
pub struct ChannelConnector {
    peers: Arc<Mutex<VecDeque<ChannelPeer>>>,
    refuse: Arc<Mutex<Option<String>>>,
}

impl ChannelConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open` calls fail with `reason`, or succeed again with `None`
    pub fn refuse_with(&self, reason: Option<&str>) {
        *self.refuse.lock() = reason.map(str::to_string);
    }

    /// Take the oldest peer that has not been taken yet
    pub fn take_peer(&self) -> Option<ChannelPeer> {
        self.peers.lock().pop_front()
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, base_url: &str) -> StreamResult<Connection> {
        if let Some(reason) = self.refuse.lock().clone() {
            return Err(StreamError::Connection(reason));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        self.peers.lock().push_back(ChannelPeer {
            inbound: in_tx,
            outbound: out_rx,
            cancel: cancel.clone(),
            base_url: base_url.to_string(),
        });

        Ok(Connection::new(out_tx, in_rx, cancel))
    }
}
