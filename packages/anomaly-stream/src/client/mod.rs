// Stream client: the dashboard's single duplex connection to the detection service
//
// The client owns at most one `Connection` and one handler per event kind.
// Inbound events are pulled one at a time (`next_event`) and dispatched to
// completion (`dispatch`) before the next one is looked at, so handlers can
// mutate shared state without further coordination.
//
// State machine:
//   Disconnected -> Connecting -> Connected <-> Streaming
//   any state --disconnect--> Disconnected

pub mod event;
pub mod protocol;
pub mod transport;

pub use event::{EventKind, InboundEvent, OutboundMessage};
pub use transport::{ChannelConnector, ChannelPeer, Connection, Connector, WebSocketConnector};

use crate::types::{AnomalyRecord, DataPoint, SimulationSettings, StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Connection lifecycle as seen by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Streaming,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Streaming)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, ConnectionState::Streaming)
    }

    /// Start is offered only while connected and idle
    pub fn can_start(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn can_stop(&self) -> bool {
        self.is_streaming()
    }

    /// Status indicator labels: (connection, activity)
    pub fn labels(&self) -> (&'static str, &'static str) {
        (
            if self.is_connected() {
                "Connected"
            } else {
                "Disconnected"
            },
            if self.is_streaming() { "Streaming" } else { "Idle" },
        )
    }
}

type ConnectHandler = Box<dyn FnMut() + Send>;
type DisconnectHandler = Box<dyn FnMut(&str) + Send>;
type DataPointHandler = Box<dyn FnMut(DataPoint) + Send>;
type AnomalyHandler = Box<dyn FnMut(AnomalyRecord) + Send>;

/// A callback for one inbound event kind
pub enum Handler {
    Connect(ConnectHandler),
    Disconnect(DisconnectHandler),
    DataPoint(DataPointHandler),
    AnomalyDetected(AnomalyHandler),
}

impl Handler {
    pub fn connect(f: impl FnMut() + Send + 'static) -> Self {
        Handler::Connect(Box::new(f))
    }

    pub fn disconnect(f: impl FnMut(&str) + Send + 'static) -> Self {
        Handler::Disconnect(Box::new(f))
    }

    pub fn data_point(f: impl FnMut(DataPoint) + Send + 'static) -> Self {
        Handler::DataPoint(Box::new(f))
    }

    pub fn anomaly_detected(f: impl FnMut(AnomalyRecord) + Send + 'static) -> Self {
        Handler::AnomalyDetected(Box::new(f))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Handler::Connect(_) => EventKind::Connect,
            Handler::Disconnect(_) => EventKind::Disconnect,
            Handler::DataPoint(_) => EventKind::DataPoint,
            Handler::AnomalyDetected(_) => EventKind::AnomalyDetected,
        }
    }
}

#[derive(Default)]
struct EventHandlers {
    connect: Option<ConnectHandler>,
    disconnect: Option<DisconnectHandler>,
    data_point: Option<DataPointHandler>,
    anomaly_detected: Option<AnomalyHandler>,
}

impl EventHandlers {
    fn set(&mut self, handler: Handler) {
        match handler {
            Handler::Connect(f) => self.connect = Some(f),
            Handler::Disconnect(f) => self.disconnect = Some(f),
            Handler::DataPoint(f) => self.data_point = Some(f),
            Handler::AnomalyDetected(f) => self.anomaly_detected = Some(f),
        }
    }

    fn has(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Connect => self.connect.is_some(),
            EventKind::Disconnect => self.disconnect.is_some(),
            EventKind::DataPoint => self.data_point.is_some(),
            EventKind::AnomalyDetected => self.anomaly_detected.is_some(),
        }
    }
}

pub struct StreamClient {
    connector: Arc<dyn Connector>,
    connection: Option<Connection>,
    handlers: EventHandlers,
    state: ConnectionState,
}

impl StreamClient {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connection: None,
            handlers: EventHandlers::default(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Client speaking Socket.IO over a websocket
    pub fn websocket() -> Self {
        Self::new(Arc::new(WebSocketConnector))
    }

    /// Open the connection, tearing down any previous one first
    ///
    /// On failure the client stays disconnected; nothing else changes.
    pub async fn connect(&mut self, url: &str) -> StreamResult<()> {
        if let Some(previous) = self.connection.take() {
            log::info!("Replacing existing connection");
            previous.close();
        }

        self.state = ConnectionState::Connecting;
        match self.connector.open(url).await {
            Ok(connection) => {
                self.connection = Some(connection);
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                log::error!("Failed to connect to {}: {}", url, e);
                Err(e)
            }
        }
    }

    /// Register the handler for one event kind, replacing any previous one
    pub fn on(&mut self, handler: Handler) {
        self.handlers.set(handler);
    }

    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.handlers.has(kind)
    }

    /// Ask the service to start streaming
    ///
    /// When disconnected this is a logged no-op: nothing is sent or queued.
    pub fn start_stream(&mut self, settings: &SimulationSettings) -> StreamResult<()> {
        let payload = settings.start_payload();
        self.send(OutboundMessage::StartStream(payload))?;
        self.state = ConnectionState::Streaming;
        log::info!(
            "Stream start requested: {} points, anomalies {}",
            settings.num_points,
            if settings.include_anomalies { "on" } else { "off" }
        );
        Ok(())
    }

    /// Ask the service to stop streaming. Logged no-op when disconnected.
    pub fn stop_stream(&mut self) -> StreamResult<()> {
        self.send(OutboundMessage::StopStream)?;
        self.state = ConnectionState::Connected;
        log::info!("Stream stop requested");
        Ok(())
    }

    fn send(&mut self, message: OutboundMessage) -> StreamResult<()> {
        let connection = match self.connection.as_ref() {
            Some(connection) if self.state.is_connected() => connection,
            _ => {
                log::error!("Cannot send {}: not connected", message.event_name());
                return Err(StreamError::NotConnected);
            }
        };

        if let Err(e) = connection.send(message) {
            log::error!("Cannot send request: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Close the connection and forget every handler
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            log::info!("Disconnected from detection service");
        }
        self.handlers = EventHandlers::default();
        self.state = ConnectionState::Disconnected;
    }

    /// Wait for the next inbound event
    ///
    /// Returns `None` when there is no connection. A transport that vanishes
    /// without saying goodbye is reported once as a disconnect.
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        let connection = self.connection.as_mut()?;
        match connection.recv().await {
            Some(event) => Some(event),
            None => Some(InboundEvent::Disconnected {
                reason: "transport closed".to_string(),
            }),
        }
    }

    /// Apply an inbound event to the client state, then run its handler
    pub fn dispatch(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Connected => {
                self.state = ConnectionState::Connected;
                log::info!("Connected to detection service");
                if let Some(handler) = self.handlers.connect.as_mut() {
                    handler();
                }
            }
            InboundEvent::Disconnected { reason } => {
                // Both flags drop together: the state is a single value.
                self.state = ConnectionState::Disconnected;
                self.connection = None;
                log::info!("Disconnected from detection service: {}", reason);
                if let Some(handler) = self.handlers.disconnect.as_mut() {
                    handler(&reason);
                }
            }
            InboundEvent::DataPoint(point) => {
                if let Some(handler) = self.handlers.data_point.as_mut() {
                    handler(point);
                }
            }
            InboundEvent::AnomalyDetected(record) => {
                if let Some(handler) = self.handlers.anomaly_detected.as_mut() {
                    handler(record);
                }
            }
        }
    }

    /// Receive and dispatch one event; `false` once there is nothing left
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.is_streaming()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}
