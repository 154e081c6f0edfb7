// One dashboard instance: connection, buffers, chart and alerts
//
// Each session owns its own client and buffers, so any number of sessions
// can run side by side. The connection is closed when the session is closed,
// reinitialized or dropped.

use crate::buffer::StreamingBuffer;
use crate::chart::ChartRenderer;
use crate::client::{
    ConnectionState, Connector, EventKind, Handler, InboundEvent, StreamClient, WebSocketConnector,
};
use crate::config::DashboardConfig;
use crate::notifier::{AlertNotifier, ToastSink};
use crate::stats::{recent_anomaly_rows, AnomalyRow, StatsSummary};
use crate::types::{
    AnomalyRecord, ChartPoint, DetectionSettings, SimulationSettings, StreamError, StreamResult,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why `DashboardSession::run` returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    Cancelled,
    Disconnected { reason: String },
}

pub struct DashboardSession {
    id: Uuid,
    config: DashboardConfig,
    url: String,
    client: StreamClient,
    buffer: Arc<Mutex<StreamingBuffer>>,
    renderer: Arc<Mutex<ChartRenderer>>,
    notifier: Arc<Mutex<AlertNotifier>>,
    simulation: SimulationSettings,
    detection: DetectionSettings,
}

impl DashboardSession {
    /// Build a session and wire the buffer to the chart and the notifier
    ///
    /// Nothing is connected yet; see `connect` and `open`.
    pub fn new(config: DashboardConfig, connector: Arc<dyn Connector>) -> Self {
        let renderer = Arc::new(Mutex::new(ChartRenderer::new(config.chart_config())));
        let notifier = Arc::new(Mutex::new(AlertNotifier::new(config.alert_ttl())));

        let mut buffer = StreamingBuffer::new(config.max_points, config.max_anomalies);
        buffer.subscribe_points(renderer.clone());
        buffer.subscribe_anomalies(notifier.clone());

        let id = Uuid::new_v4();
        log::debug!("Created dashboard session {}", id);

        Self {
            id,
            url: config.api_url.clone(),
            config,
            client: StreamClient::new(connector),
            buffer: Arc::new(Mutex::new(buffer)),
            renderer,
            notifier,
            simulation: SimulationSettings::default(),
            detection: DetectionSettings::default(),
        }
    }

    /// Session talking to the configured service over a websocket
    pub fn websocket(config: DashboardConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector))
    }

    /// Build and connect
    ///
    /// A failed connection is not fatal: the session is returned disconnected
    /// and the failure has already been logged.
    pub async fn open(config: DashboardConfig, connector: Arc<dyn Connector>) -> Self {
        let mut session = Self::new(config, connector);
        session.connect().await.ok();
        session
    }

    fn register_handlers(&mut self) {
        let buffer = self.buffer.clone();
        self.client.on(Handler::data_point(move |point| {
            buffer.lock().append_point(point);
        }));

        let buffer = self.buffer.clone();
        self.client.on(Handler::anomaly_detected(move |record| {
            buffer.lock().append_anomaly(record);
        }));
    }

    /// Connect to the current URL, replacing any existing connection
    pub async fn connect(&mut self) -> StreamResult<()> {
        self.register_handlers();
        let url = self.url.clone();
        self.client.connect(&url).await
    }

    /// Tear the client down and connect again, possibly to a new URL
    pub async fn reinitialize(&mut self, url: &str) -> StreamResult<()> {
        log::info!("Reinitializing session {} against {}", self.id, url);
        self.client.disconnect();
        self.url = url.to_string();
        self.connect().await
    }

    /// Process events until the service acknowledges the connection
    pub async fn wait_until_connected(&mut self) -> StreamResult<()> {
        while !self.client.is_connected() {
            match self.client.next_event().await {
                Some(event) => self.client.dispatch(event),
                None => return Err(StreamError::NotConnected),
            }
        }
        Ok(())
    }

    /// Request a stream and start a fresh buffer session
    ///
    /// The buffers are only reset once the request was actually sent.
    pub fn start_stream(&mut self, settings: SimulationSettings) -> StreamResult<()> {
        self.client.start_stream(&settings)?;
        self.buffer.lock().reset();
        log::debug!(
            "Session {} streaming with {} (window {}, threshold {})",
            self.id,
            self.detection.model_type,
            self.detection.window_size,
            self.detection.threshold
        );
        self.simulation = settings;
        Ok(())
    }

    pub fn stop_stream(&mut self) -> StreamResult<()> {
        self.client.stop_stream()
    }

    /// Receive and apply one inbound event; `false` when disconnected
    pub async fn pump(&mut self) -> bool {
        self.client.pump().await
    }

    /// Drive the session until `cancel` fires or the connection drops
    ///
    /// Alerts are expired on time while waiting. `on_event` runs after every
    /// inbound event has been fully applied.
    pub async fn run<F>(&mut self, cancel: &CancellationToken, mut on_event: F) -> RunExit
    where
        F: FnMut(&DashboardSession, EventKind),
    {
        loop {
            let next_expiry = self.notifier.lock().next_expiry();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    log::info!("Session {} cancelled", self.id);
                    return RunExit::Cancelled;
                }

                event = self.client.next_event() => {
                    let Some(event) = event else {
                        return RunExit::Disconnected {
                            reason: "not connected".to_string(),
                        };
                    };
                    let kind = event.kind();
                    let reason = match &event {
                        InboundEvent::Disconnected { reason } => Some(reason.clone()),
                        _ => None,
                    };
                    self.client.dispatch(event);
                    on_event(&*self, kind);
                    if let Some(reason) = reason {
                        return RunExit::Disconnected { reason };
                    }
                }

                _ = wait_until(next_expiry) => {
                    let expired = self.notifier.lock().expire(Instant::now());
                    log::debug!("Expired {} alert(s)", expired.len());
                }
            }
        }
    }

    /// Stop streaming if needed, close the connection and take down any alerts
    pub fn close(&mut self) {
        if self.client.is_streaming() {
            self.client.stop_stream().ok();
        }
        self.client.disconnect();
        self.notifier.lock().dismiss_all();
        log::debug!("Closed dashboard session {}", self.id);
    }

    pub fn add_toast_sink<S: ToastSink + 'static>(&mut self, sink: S) {
        self.notifier.lock().add_sink(sink);
    }

    pub fn set_detection(&mut self, detection: DetectionSettings) {
        self.detection = detection;
    }

    pub fn detection(&self) -> &DetectionSettings {
        &self.detection
    }

    pub fn simulation(&self) -> &SimulationSettings {
        &self.simulation
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn is_streaming(&self) -> bool {
        self.client.is_streaming()
    }

    pub fn points(&self) -> Vec<ChartPoint> {
        self.buffer.lock().points()
    }

    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        self.buffer.lock().anomalies()
    }

    pub fn stats(&self) -> StatsSummary {
        let buffer = self.buffer.lock();
        StatsSummary::from_buffers(&buffer.points(), &buffer.anomalies())
    }

    pub fn anomaly_rows(&self) -> Vec<AnomalyRow> {
        recent_anomaly_rows(&self.anomalies())
    }

    pub fn svg(&self) -> String {
        self.renderer.lock().to_svg()
    }

    pub fn buffer(&self) -> Arc<Mutex<StreamingBuffer>> {
        self.buffer.clone()
    }

    pub fn renderer(&self) -> Arc<Mutex<ChartRenderer>> {
        self.renderer.clone()
    }

    pub fn notifier(&self) -> Arc<Mutex<AlertNotifier>> {
        self.notifier.clone()
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.client.disconnect();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChannelConnector, ChannelPeer, OutboundMessage};
    use crate::types::DataPoint;
    use chrono::Utc;
    use std::time::Duration;

    fn point(value: f64, is_anomaly: bool) -> InboundEvent {
        InboundEvent::DataPoint(DataPoint {
            timestamp: Utc::now(),
            value,
            is_anomaly,
        })
    }

    fn anomaly(index: i64) -> InboundEvent {
        InboundEvent::AnomalyDetected(AnomalyRecord {
            timestamp: Utc::now(),
            value: 4.2,
            score: 0.3,
            threshold: 0.05,
            index,
        })
    }

    async fn connected_session() -> (DashboardSession, ChannelConnector, ChannelPeer) {
        let connector = ChannelConnector::new();
        let mut session =
            DashboardSession::open(DashboardConfig::default(), Arc::new(connector.clone())).await;
        let peer = connector.take_peer().unwrap();
        peer.emit(InboundEvent::Connected);
        session.wait_until_connected().await.unwrap();
        (session, connector, peer)
    }

    #[tokio::test]
    async fn test_open_connects_to_configured_url() {
        let (session, _connector, peer) = connected_session().await;
        assert_eq!(peer.base_url, "http://localhost:5000");
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_inbound_events_reach_buffer_chart_and_alerts() {
        let (mut session, _connector, mut peer) = connected_session().await;
        session.start_stream(SimulationSettings::default()).unwrap();
        assert_eq!(
            peer.drain_sent(),
            vec![OutboundMessage::StartStream(
                SimulationSettings::default().start_payload()
            )]
        );

        peer.emit(point(1.0, false));
        peer.emit(point(2.0, true));
        peer.emit(anomaly(1));
        for _ in 0..3 {
            assert!(session.pump().await);
        }

        let points = session.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].sequence_id, 1);
        assert_eq!(session.anomalies().len(), 1);
        assert_eq!(session.renderer().lock().scene().markers.len(), 2);
        assert_eq!(session.notifier().lock().fired_count(), 1);

        let stats = session.stats();
        assert_eq!(stats.total_points, 2);
        assert_eq!(stats.anomaly_rate, 50.0);
        assert_eq!(session.anomaly_rows().len(), 1);
        assert!(session.svg().contains("<circle"));
    }

    #[tokio::test]
    async fn test_new_stream_resets_sequence_ids() {
        let (mut session, _connector, peer) = connected_session().await;
        session.start_stream(SimulationSettings::default()).unwrap();
        peer.emit(point(1.0, false));
        peer.emit(point(2.0, false));
        session.pump().await;
        session.pump().await;

        session.stop_stream().unwrap();
        session.start_stream(SimulationSettings::default()).unwrap();
        assert!(session.points().is_empty());

        peer.emit(point(3.0, false));
        session.pump().await;
        assert_eq!(session.points()[0].sequence_id, 0);
    }

    #[tokio::test]
    async fn test_start_while_disconnected_keeps_buffers() {
        let connector = ChannelConnector::new();
        connector.refuse_with(Some("refused"));
        let mut session =
            DashboardSession::open(DashboardConfig::default(), Arc::new(connector)).await;

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(matches!(
            session.start_stream(SimulationSettings::default()),
            Err(StreamError::NotConnected)
        ));
        assert!(session.wait_until_connected().await.is_err());
    }

    #[tokio::test]
    async fn test_reinitialize_closes_previous_connection() {
        let (mut session, connector, first) = connected_session().await;
        session.reinitialize("http://10.0.0.5:5000").await.unwrap();

        assert!(first.is_closed());
        let second = connector.take_peer().unwrap();
        assert_eq!(second.base_url, "http://10.0.0.5:5000");
        assert_eq!(session.url(), "http://10.0.0.5:5000");

        // Handlers survive the reinitialization
        second.emit(InboundEvent::Connected);
        second.emit(point(5.0, false));
        session.wait_until_connected().await.unwrap();
        session.pump().await;
        assert_eq!(session.points().len(), 1);
    }

    #[test]
    fn test_start_while_disconnected_logs_once() {
        crate::test_log::capture();
        let mut session =
            DashboardSession::new(DashboardConfig::default(), Arc::new(ChannelConnector::new()));

        assert!(session.start_stream(SimulationSettings::default()).is_err());
        assert_eq!(crate::test_log::errors().len(), 1);
    }

    #[tokio::test]
    async fn test_close_sends_stop_then_disconnects() {
        let (mut session, _connector, mut peer) = connected_session().await;
        session.start_stream(SimulationSettings::default()).unwrap();
        peer.emit(anomaly(3));
        session.pump().await;
        assert_eq!(session.notifier().lock().active_count(), 1);
        session.close();
        assert_eq!(session.notifier().lock().active_count(), 0);

        let sent = peer.drain_sent();
        assert_eq!(sent.last(), Some(&OutboundMessage::StopStream));
        assert!(peer.is_closed());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_drop_closes_connection() {
        let (session, _connector, peer) = connected_session().await;
        drop(session);
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn test_run_stops_on_disconnect() {
        let (mut session, _connector, peer) = connected_session().await;
        session.start_stream(SimulationSettings::default()).unwrap();
        peer.emit(point(1.0, false));
        peer.emit(InboundEvent::Disconnected {
            reason: "server shutdown".to_string(),
        });

        let cancel = CancellationToken::new();
        let mut kinds = Vec::new();
        let exit = session.run(&cancel, |_, kind| kinds.push(kind)).await;

        assert_eq!(
            exit,
            RunExit::Disconnected {
                reason: "server shutdown".to_string()
            }
        );
        assert_eq!(kinds, vec![EventKind::DataPoint, EventKind::Disconnect]);
        assert!(!session.is_connected());
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn test_run_honours_cancellation() {
        let (mut session, _connector, _peer) = connected_session().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let exit = session.run(&cancel, |_, _| {}).await;
        assert_eq!(exit, RunExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_expires_alerts() {
        let (mut session, _connector, peer) = connected_session().await;
        peer.emit(anomaly(1));
        session.pump().await;
        assert_eq!(session.notifier().lock().active_count(), 1);

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            stopper.cancel();
        });

        assert_eq!(session.run(&cancel, |_, _| {}).await, RunExit::Cancelled);
        assert_eq!(session.notifier().lock().active_count(), 0);
    }
}
