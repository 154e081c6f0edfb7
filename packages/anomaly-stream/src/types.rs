// Common types for the anomaly streaming pipeline
//
// Everything here is produced either by the detection service (data points and
// anomaly records) or by the dashboard's control surface (settings). The core
// transports settings but never interprets them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Result type for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur in the streaming pipeline
///
/// None of these are fatal to a dashboard session. They are logged by the
/// component that hits them and surfaced to the caller as plain values.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid payload for '{event}': {message}")]
    Payload { event: String, message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Channel closed")]
    ChannelClosed,
}

/// A single observation emitted by the detection service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default)]
    pub is_anomaly: bool,
}

/// A data point as held by the streaming buffer
///
/// `sequence_id` is assigned on arrival, starts at 0 for each streaming
/// session and is never reused, even after the point has been evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub sequence_id: u64,
    #[serde(flatten)]
    pub point: DataPoint,
}

impl ChartPoint {
    pub fn value(&self) -> f64 {
        self.point.value
    }

    pub fn is_anomaly(&self) -> bool {
        self.point.is_anomaly
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.point.timestamp
    }
}

/// An observation flagged by the detection service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(with = "iso_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub score: f64,
    pub threshold: f64,
    /// Position of the anomaly in the service's source sequence
    pub index: i64,
}

/// Simulation parameters sent when a stream starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    pub num_points: u32,
    pub include_anomalies: bool,
    /// Emission interval in milliseconds. Carried for the control surface only.
    pub interval_ms: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            num_points: 1000,
            include_anomalies: true,
            interval_ms: 100,
        }
    }
}

impl SimulationSettings {
    /// Build the `start_stream` wire payload
    pub fn start_payload(&self) -> StartStreamPayload {
        StartStreamPayload {
            num_points: self.num_points,
            include_anomalies: self.include_anomalies,
        }
    }
}

/// Payload of the `start_stream` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartStreamPayload {
    pub num_points: u32,
    pub include_anomalies: bool,
}

/// Detection model run by the external service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    #[default]
    IsolationForest,
    Lstm,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::IsolationForest => "isolation_forest",
            ModelType::Lstm => "lstm",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isolation_forest" => Ok(ModelType::IsolationForest),
            "lstm" => Ok(ModelType::Lstm),
            other => Err(format!(
                "unknown model type '{}' (expected isolation_forest or lstm)",
                other
            )),
        }
    }
}

/// Detection parameters configured on the dashboard
///
/// Opaque to this crate: carried alongside the session, never validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    pub model_type: ModelType,
    pub window_size: u32,
    pub threshold: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            model_type: ModelType::IsolationForest,
            window_size: 100,
            threshold: 0.05,
        }
    }
}

/// ISO-8601 timestamps as emitted by the detection service.
///
/// The service writes naive UTC (`2024-05-01T12:00:00.123456`), other
/// producers write RFC 3339 with an offset. Both are accepted; naive values
/// are taken as UTC.
pub mod iso_timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid ISO-8601 timestamp '{}': {}", raw, e))
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}
