// Bounded sliding-window buffers for streamed points and anomaly records
//
// Both windows evict strictly FIFO once full. Every mutation synchronously
// hands a snapshot to the registered subscribers (the chart renderer and the
// alert notifier), so nothing downstream ever polls.

use crate::types::{AnomalyRecord, ChartPoint, DataPoint};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Default capacity of the data-point window
pub const DEFAULT_POINT_CAPACITY: usize = 100;

/// Default capacity of the anomaly-record window
pub const DEFAULT_ANOMALY_CAPACITY: usize = 20;

/// Metrics for a sliding window
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WindowMetrics {
    pub total_pushed: u64,
    pub total_evicted: u64,
    pub current_size: usize,
    pub capacity: usize,
}

/// Fixed-capacity FIFO window, oldest entries dropped first
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
    total_pushed: u64,
    total_evicted: u64,
}

impl<T> SlidingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
            total_evicted: 0,
        }
    }

    /// Append an item, then truncate to the most recent `capacity` items
    ///
    /// Returns the evicted items, oldest first.
    pub fn push(&mut self, item: T) -> Vec<T> {
        self.items.push_back(item);
        self.total_pushed += 1;

        let mut evicted = Vec::new();
        while self.items.len() > self.capacity {
            if let Some(oldest) = self.items.pop_front() {
                evicted.push(oldest);
            }
        }
        self.total_evicted += evicted.len() as u64;
        evicted
    }

    /// Contiguous view of the window, oldest to newest
    pub fn as_slice(&mut self) -> &[T] {
        self.items.make_contiguous()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn metrics(&self) -> WindowMetrics {
        WindowMetrics {
            total_pushed: self.total_pushed,
            total_evicted: self.total_evicted,
            current_size: self.items.len(),
            capacity: self.capacity,
        }
    }

    pub fn reset_metrics(&mut self) {
        self.total_pushed = 0;
        self.total_evicted = 0;
    }
}

impl<T: Clone> SlidingWindow<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// What a subscriber receives after every buffer mutation
#[derive(Debug, Clone, Copy)]
pub struct BufferSnapshot<'a, T> {
    /// Current window contents, oldest to newest
    pub items: &'a [T],
    /// Appends since the current session started (unaffected by eviction)
    pub appended: u64,
    /// Streaming session counter, bumped on every reset
    pub session: u64,
}

/// Observer of one of the streaming windows
pub trait BufferSubscriber<T>: Send {
    fn receive(&mut self, snapshot: &BufferSnapshot<'_, T>);
}

impl<T, S> BufferSubscriber<T> for Arc<Mutex<S>>
where
    S: BufferSubscriber<T> + ?Sized,
{
    fn receive(&mut self, snapshot: &BufferSnapshot<'_, T>) {
        self.lock().receive(snapshot);
    }
}

type Subscribers<T> = Vec<Box<dyn BufferSubscriber<T>>>;

/// The dashboard's two streaming windows plus their subscriber sets
pub struct StreamingBuffer {
    points: SlidingWindow<ChartPoint>,
    anomalies: SlidingWindow<AnomalyRecord>,
    next_sequence_id: u64,
    anomalies_appended: u64,
    session: u64,

    point_subscribers: Subscribers<ChartPoint>,
    anomaly_subscribers: Subscribers<AnomalyRecord>,
}

impl Default for StreamingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_POINT_CAPACITY, DEFAULT_ANOMALY_CAPACITY)
    }
}

impl StreamingBuffer {
    pub fn new(point_capacity: usize, anomaly_capacity: usize) -> Self {
        Self {
            points: SlidingWindow::new(point_capacity),
            anomalies: SlidingWindow::new(anomaly_capacity),
            next_sequence_id: 0,
            anomalies_appended: 0,
            session: 0,
            point_subscribers: Vec::new(),
            anomaly_subscribers: Vec::new(),
        }
    }

    /// Register an observer of the data-point window
    pub fn subscribe_points<S>(&mut self, subscriber: S)
    where
        S: BufferSubscriber<ChartPoint> + 'static,
    {
        self.point_subscribers.push(Box::new(subscriber));
    }

    /// Register an observer of the anomaly window
    pub fn subscribe_anomalies<S>(&mut self, subscriber: S)
    where
        S: BufferSubscriber<AnomalyRecord> + 'static,
    {
        self.anomaly_subscribers.push(Box::new(subscriber));
    }

    /// Assign the next sequence id, append, evict past capacity, notify
    ///
    /// Returns the sequence id given to the point.
    pub fn append_point(&mut self, point: DataPoint) -> u64 {
        let sequence_id = self.next_sequence_id;
        self.next_sequence_id += 1;

        let evicted = self.points.push(ChartPoint { sequence_id, point });
        if !evicted.is_empty() {
            log::trace!("Evicted {} data point(s) from window", evicted.len());
        }

        self.notify_points();
        sequence_id
    }

    /// Append an anomaly record, evict past capacity, notify
    pub fn append_anomaly(&mut self, record: AnomalyRecord) {
        self.anomalies.push(record);
        self.anomalies_appended += 1;
        self.notify_anomalies();
    }

    /// Start a new streaming session: clear both windows and restart ids at 0
    pub fn reset(&mut self) {
        self.points.clear();
        self.points.reset_metrics();
        self.anomalies.clear();
        self.anomalies.reset_metrics();
        self.next_sequence_id = 0;
        self.anomalies_appended = 0;
        self.session += 1;

        log::debug!("Streaming buffer reset (session {})", self.session);

        self.notify_points();
        self.notify_anomalies();
    }

    fn notify_points(&mut self) {
        let snapshot = BufferSnapshot {
            items: self.points.as_slice(),
            appended: self.next_sequence_id,
            session: self.session,
        };
        for subscriber in self.point_subscribers.iter_mut() {
            subscriber.receive(&snapshot);
        }
    }

    fn notify_anomalies(&mut self) {
        let snapshot = BufferSnapshot {
            items: self.anomalies.as_slice(),
            appended: self.anomalies_appended,
            session: self.session,
        };
        for subscriber in self.anomaly_subscribers.iter_mut() {
            subscriber.receive(&snapshot);
        }
    }

    pub fn points(&self) -> Vec<ChartPoint> {
        self.points.to_vec()
    }

    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        self.anomalies.to_vec()
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn point_metrics(&self) -> WindowMetrics {
        self.points.metrics()
    }

    pub fn anomaly_metrics(&self) -> WindowMetrics {
        self.anomalies.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn point(value: f64) -> DataPoint {
        DataPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            value,
            is_anomaly: false,
        }
    }

    fn record(index: i64) -> AnomalyRecord {
        AnomalyRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            value: index as f64,
            score: 0.2,
            threshold: 0.05,
            index,
        }
    }

    #[derive(Default)]
    struct Recorder {
        lengths: Vec<usize>,
        appended: Vec<u64>,
    }

    impl<T> BufferSubscriber<T> for Recorder {
        fn receive(&mut self, snapshot: &BufferSnapshot<'_, T>) {
            self.lengths.push(snapshot.items.len());
            self.appended.push(snapshot.appended);
        }
    }

    #[test]
    fn test_sliding_window_drops_oldest() {
        let mut window = SlidingWindow::new(3);
        assert!(window.push(1).is_empty());
        window.push(2);
        window.push(3);
        assert_eq!(window.push(4), vec![1]);
        assert_eq!(window.to_vec(), vec![2, 3, 4]);

        let metrics = window.metrics();
        assert_eq!(metrics.total_pushed, 4);
        assert_eq!(metrics.total_evicted, 1);
        assert_eq!(metrics.current_size, 3);
    }

    #[test]
    fn test_point_window_keeps_most_recent_hundred() {
        for n in [0usize, 1, 99, 100, 101, 250] {
            let mut buffer = StreamingBuffer::default();
            for i in 0..n {
                buffer.append_point(point(i as f64));
            }
            let points = buffer.points();
            assert_eq!(points.len(), n.min(100));

            let expected: Vec<f64> = (n.saturating_sub(100)..n).map(|i| i as f64).collect();
            let values: Vec<f64> = points.iter().map(|p| p.value()).collect();
            assert_eq!(values, expected);
        }
    }

    #[test]
    fn test_sequence_ids_survive_eviction() {
        let mut buffer = StreamingBuffer::default();
        for i in 0..150 {
            assert_eq!(buffer.append_point(point(i as f64)), i);
        }
        let ids: Vec<u64> = buffer.points().iter().map(|p| p.sequence_id).collect();
        assert_eq!(ids, (50..150).collect::<Vec<u64>>());
    }

    #[test]
    fn test_reset_restarts_sequence_at_zero() {
        let mut buffer = StreamingBuffer::default();
        for i in 0..10 {
            buffer.append_point(point(i as f64));
        }
        buffer.append_anomaly(record(1));
        buffer.reset();

        assert_eq!(buffer.point_count(), 0);
        assert_eq!(buffer.anomaly_count(), 0);
        assert_eq!(buffer.session(), 1);
        assert_eq!(buffer.append_point(point(1.0)), 0);
    }

    #[test]
    fn test_anomaly_window_keeps_most_recent_twenty() {
        let mut buffer = StreamingBuffer::default();
        for i in 0..45 {
            buffer.append_anomaly(record(i));
        }
        let indices: Vec<i64> = buffer.anomalies().iter().map(|r| r.index).collect();
        assert_eq!(indices, (25..45).collect::<Vec<i64>>());
        assert_eq!(buffer.anomaly_metrics().total_evicted, 25);
    }

    #[test]
    fn test_subscribers_notified_synchronously() {
        let points = Arc::new(Mutex::new(Recorder::default()));
        let anomalies = Arc::new(Mutex::new(Recorder::default()));

        let mut buffer = StreamingBuffer::new(2, 1);
        buffer.subscribe_points(points.clone());
        buffer.subscribe_anomalies(anomalies.clone());

        buffer.append_point(point(1.0));
        buffer.append_point(point(2.0));
        buffer.append_point(point(3.0));
        buffer.append_anomaly(record(0));
        buffer.append_anomaly(record(1));

        assert_eq!(points.lock().lengths, vec![1, 2, 2]);
        assert_eq!(points.lock().appended, vec![1, 2, 3]);
        assert_eq!(anomalies.lock().lengths, vec![1, 1]);
        assert_eq!(anomalies.lock().appended, vec![1, 2]);
    }
}
