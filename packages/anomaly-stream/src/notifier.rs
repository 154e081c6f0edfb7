// Transient alerts for newly detected anomalies
//
// The notifier watches the anomaly window. Alert identity comes from the
// append counter carried by each snapshot, so eviction from the window can
// never make an old record look new again.

use crate::buffer::{BufferSnapshot, BufferSubscriber};
use crate::types::AnomalyRecord;
use chrono::Local;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

pub const ALERT_TITLE: &str = "Anomaly Detected!";

/// How long an alert stays up unless dismissed
pub const DEFAULT_ALERT_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub title: &'static str,
    pub value: String,
    pub score: String,
    pub time: String,
    pub record: AnomalyRecord,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl Toast {
    fn new(id: u64, record: AnomalyRecord, now: Instant, ttl: Duration) -> Self {
        Self {
            id,
            title: ALERT_TITLE,
            value: format!("{:.3}", record.value),
            score: format!("{:.3}", record.score),
            time: record
                .timestamp
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
            record,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Value: {}\nScore: {}\nTime: {}",
            self.value, self.score, self.time
        )
    }
}

/// Where alerts are shown
pub trait ToastSink: Send {
    fn show(&mut self, toast: &Toast);

    fn dismiss(&mut self, _id: u64) {}
}

/// Shows alerts as warning lines in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToastSink;

impl ToastSink for LogToastSink {
    fn show(&mut self, toast: &Toast) {
        log::warn!(
            "{} value={} score={} threshold={:.3} index={} time={}",
            toast.title,
            toast.value,
            toast.score,
            toast.record.threshold,
            toast.record.index,
            toast.time
        );
    }
}

pub struct AlertNotifier {
    ttl: Duration,
    /// Newest first
    active: VecDeque<Toast>,
    sinks: Vec<Box<dyn ToastSink>>,
    next_id: u64,
    session: u64,
    notified: u64,
    fired: u64,
}

impl Default for AlertNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_TTL)
    }
}

impl AlertNotifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            active: VecDeque::new(),
            sinks: Vec::new(),
            next_id: 0,
            session: 0,
            notified: 0,
            fired: 0,
        }
    }

    pub fn add_sink<S: ToastSink + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    pub fn with_sink<S: ToastSink + 'static>(mut self, sink: S) -> Self {
        self.add_sink(sink);
        self
    }

    fn notify(&mut self, record: AnomalyRecord, now: Instant) {
        let toast = Toast::new(self.next_id, record, now, self.ttl);
        self.next_id += 1;
        self.fired += 1;
        for sink in self.sinks.iter_mut() {
            sink.show(&toast);
        }
        self.active.push_front(toast);
    }

    /// Dismiss one alert; returns it if it was still up
    pub fn dismiss(&mut self, id: u64) -> Option<Toast> {
        let position = self.active.iter().position(|t| t.id == id)?;
        let toast = self.active.remove(position)?;
        for sink in self.sinks.iter_mut() {
            sink.dismiss(id);
        }
        Some(toast)
    }

    pub fn dismiss_all(&mut self) {
        for toast in self.active.drain(..) {
            for sink in self.sinks.iter_mut() {
                sink.dismiss(toast.id);
            }
        }
    }

    /// Drop every alert whose lifetime ended at or before `now`
    pub fn expire(&mut self, now: Instant) -> Vec<Toast> {
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(self.active.len());
        for toast in self.active.drain(..) {
            if toast.expires_at <= now {
                expired.push(toast);
            } else {
                kept.push_back(toast);
            }
        }
        self.active = kept;

        for toast in &expired {
            for sink in self.sinks.iter_mut() {
                sink.dismiss(toast.id);
            }
        }
        expired
    }

    /// When the next alert is due to auto-dismiss
    pub fn next_expiry(&self) -> Option<Instant> {
        self.active.iter().map(|t| t.expires_at).min()
    }

    /// Alerts currently up, newest first
    pub fn active(&self) -> impl Iterator<Item = &Toast> {
        self.active.iter()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Alerts fired over the notifier's lifetime
    pub fn fired_count(&self) -> u64 {
        self.fired
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl BufferSubscriber<AnomalyRecord> for AlertNotifier {
    fn receive(&mut self, snapshot: &BufferSnapshot<'_, AnomalyRecord>) {
        if snapshot.session != self.session {
            self.session = snapshot.session;
            self.notified = 0;
        }
        if snapshot.appended <= self.notified {
            self.notified = snapshot.appended;
            return;
        }

        let fresh = (snapshot.appended - self.notified).min(snapshot.items.len() as u64) as usize;
        let now = Instant::now();
        let start = snapshot.items.len() - fresh;
        for record in &snapshot.items[start..] {
            self.notify(record.clone(), now);
        }
        self.notified = snapshot.appended;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::StreamingBuffer;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn record(index: i64) -> AnomalyRecord {
        AnomalyRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            value: index as f64 + 0.5,
            score: 0.12345,
            threshold: 0.05,
            index,
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        shown: Arc<Mutex<Vec<i64>>>,
        dismissed: Arc<Mutex<Vec<u64>>>,
    }

    impl ToastSink for Recorder {
        fn show(&mut self, toast: &Toast) {
            self.shown.lock().push(toast.record.index);
        }

        fn dismiss(&mut self, id: u64) {
            self.dismissed.lock().push(id);
        }
    }

    fn wired(capacity: usize) -> (StreamingBuffer, Arc<Mutex<AlertNotifier>>, Recorder) {
        let recorder = Recorder::default();
        let notifier = Arc::new(Mutex::new(
            AlertNotifier::default().with_sink(recorder.clone()),
        ));
        let mut buffer = StreamingBuffer::new(10, capacity);
        buffer.subscribe_anomalies(notifier.clone());
        (buffer, notifier, recorder)
    }

    #[test]
    fn test_each_growth_fires_exactly_once() {
        let (mut buffer, notifier, recorder) = wired(20);

        buffer.append_anomaly(record(1));
        assert_eq!(*recorder.shown.lock(), vec![1]);

        buffer.append_anomaly(record(2));
        assert_eq!(*recorder.shown.lock(), vec![1, 2]);
        assert_eq!(notifier.lock().fired_count(), 2);
    }

    #[test]
    fn test_no_refire_across_truncation() {
        let (mut buffer, notifier, recorder) = wired(3);
        for i in 0..10 {
            buffer.append_anomaly(record(i));
        }
        assert_eq!(*recorder.shown.lock(), (0..10).collect::<Vec<_>>());
        assert_eq!(notifier.lock().fired_count(), 10);
    }

    #[test]
    fn test_reset_starts_a_new_session_without_refiring() {
        let (mut buffer, _notifier, recorder) = wired(20);
        buffer.append_anomaly(record(1));
        buffer.reset();
        assert_eq!(recorder.shown.lock().len(), 1);

        buffer.append_anomaly(record(7));
        assert_eq!(*recorder.shown.lock(), vec![1, 7]);
    }

    #[test]
    fn test_stack_is_newest_first() {
        let (mut buffer, notifier, _recorder) = wired(20);
        buffer.append_anomaly(record(1));
        buffer.append_anomaly(record(2));
        buffer.append_anomaly(record(3));

        let notifier = notifier.lock();
        let order: Vec<i64> = notifier.active().map(|t| t.record.index).collect();
        assert_eq!(order, vec![3, 2, 1]);

        let newest = notifier.active().next().unwrap();
        assert_eq!(newest.title, "Anomaly Detected!");
        assert_eq!(newest.value, "3.500");
        assert_eq!(newest.score, "0.123");
        assert!(newest.message().starts_with("Value: 3.500\nScore: 0.123\nTime: "));
    }

    #[test]
    fn test_dismiss_and_expire() {
        let (mut buffer, notifier, recorder) = wired(20);
        buffer.append_anomaly(record(1));
        buffer.append_anomaly(record(2));

        let mut notifier = notifier.lock();
        let first_id = notifier.active().last().unwrap().id;
        assert!(notifier.dismiss(first_id).is_some());
        assert!(notifier.dismiss(first_id).is_none());
        assert_eq!(notifier.active_count(), 1);

        let due = notifier.next_expiry().unwrap();
        assert!(notifier.expire(due - Duration::from_millis(1)).is_empty());
        let expired = notifier.expire(due);
        assert_eq!(expired.len(), 1);
        assert_eq!(notifier.active_count(), 0);
        assert!(notifier.next_expiry().is_none());
        assert_eq!(recorder.dismissed.lock().len(), 2);
    }

    #[test]
    fn test_dismiss_all_clears_the_stack() {
        let (mut buffer, notifier, recorder) = wired(20);
        buffer.append_anomaly(record(1));
        buffer.append_anomaly(record(2));

        notifier.lock().dismiss_all();
        assert_eq!(notifier.lock().active_count(), 0);
        assert_eq!(*recorder.dismissed.lock(), vec![1, 0]);
        assert_eq!(notifier.lock().fired_count(), 2);
    }

    #[test]
    fn test_ttl_defaults_to_five_seconds() {
        let notifier = AlertNotifier::default();
        assert_eq!(notifier.ttl(), Duration::from_secs(5));
    }
}
