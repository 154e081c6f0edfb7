// Real-time data pipeline for a live anomaly-detection dashboard
//
// Points and anomaly records arrive from an external detection service over
// a Socket.IO connection, land in two bounded sliding windows, and every
// window mutation synchronously redraws the chart and raises alerts.
//
// Architecture:
// - `client`: Socket.IO stream client with pluggable transports
// - `buffer`: Bounded FIFO windows with synchronous subscribers
// - `chart`: Scale computation, scene building, hover handling and SVG output
// - `notifier`: One auto-dismissing alert per newly appended anomaly
// - `stats`: Summary figures and the recent-anomaly table
// - `dashboard`: Per-instance session tying everything together
// - `config`: Environment-driven configuration
// - `api`: REST health probe

pub mod api;
pub mod buffer;
pub mod chart;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod notifier;
pub mod stats;
pub mod types;

#[cfg(test)]
mod test_log;

pub use buffer::{BufferSnapshot, BufferSubscriber, SlidingWindow, StreamingBuffer};
pub use chart::{ChartConfig, ChartRenderer, ChartScales, LayoutSource, Margin, Tooltip};
pub use client::{ConnectionState, Handler, StreamClient};
pub use config::{ConfigError, DashboardConfig};
pub use dashboard::{DashboardSession, RunExit};
pub use notifier::{AlertNotifier, LogToastSink, Toast, ToastSink};
pub use stats::{AnomalyRow, Severity, StatsSummary};
pub use types::{
    AnomalyRecord, ChartPoint, DataPoint, DetectionSettings, ModelType, SimulationSettings,
    StreamError, StreamResult,
};
