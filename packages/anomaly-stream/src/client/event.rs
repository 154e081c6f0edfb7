// Typed events exchanged with the detection service

use crate::client::protocol::event_frame;
use crate::types::{AnomalyRecord, DataPoint, StartStreamPayload, StreamError, StreamResult};
use serde_json::Value;

pub const EVENT_DATA_POINT: &str = "data_point";
pub const EVENT_ANOMALY_DETECTED: &str = "anomaly_detected";
pub const EVENT_START_STREAM: &str = "start_stream";
pub const EVENT_STOP_STREAM: &str = "stop_stream";

/// Kinds of inbound event a handler can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    DataPoint,
    AnomalyDetected,
}

/// Events delivered from the service (or the transport) to the client
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Connected,
    Disconnected { reason: String },
    DataPoint(DataPoint),
    AnomalyDetected(AnomalyRecord),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::Connected => EventKind::Connect,
            InboundEvent::Disconnected { .. } => EventKind::Disconnect,
            InboundEvent::DataPoint(_) => EventKind::DataPoint,
            InboundEvent::AnomalyDetected(_) => EventKind::AnomalyDetected,
        }
    }

    /// Decode a named Socket.IO event
    ///
    /// Returns `Ok(None)` for events this client does not consume.
    pub fn from_socket_event(name: &str, args: Vec<Value>) -> StreamResult<Option<Self>> {
        let payload = || {
            args.into_iter().next().ok_or_else(|| StreamError::Payload {
                event: name.to_string(),
                message: "missing payload".to_string(),
            })
        };
        let invalid = |e: serde_json::Error| StreamError::Payload {
            event: name.to_string(),
            message: e.to_string(),
        };

        match name {
            EVENT_DATA_POINT => serde_json::from_value(payload()?)
                .map(|point| Some(InboundEvent::DataPoint(point)))
                .map_err(invalid),
            EVENT_ANOMALY_DETECTED => serde_json::from_value(payload()?)
                .map(|record| Some(InboundEvent::AnomalyDetected(record)))
                .map_err(invalid),
            _ => Ok(None),
        }
    }
}

/// Requests sent from the client to the service
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    StartStream(StartStreamPayload),
    StopStream,
}

impl OutboundMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundMessage::StartStream(_) => EVENT_START_STREAM,
            OutboundMessage::StopStream => EVENT_STOP_STREAM,
        }
    }

    /// Encode as a Socket.IO event frame for `namespace`
    pub fn to_frame(&self, namespace: &str) -> StreamResult<String> {
        let payload = match self {
            OutboundMessage::StartStream(payload) => {
                Some(serde_json::to_value(payload).map_err(|e| StreamError::Payload {
                    event: EVENT_START_STREAM.to_string(),
                    message: e.to_string(),
                })?)
            }
            OutboundMessage::StopStream => None,
        };
        Ok(event_frame(namespace, self.event_name(), payload))
    }
}
