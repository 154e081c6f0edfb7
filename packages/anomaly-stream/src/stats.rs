// Summary figures and the recent-anomaly table shown beside the chart

use crate::types::{AnomalyRecord, ChartPoint};
use chrono::Local;
use serde::{Deserialize, Serialize};

/// Values averaged for `recent_average`
pub const RECENT_WINDOW: usize = 10;

/// Rows shown in the recent-anomaly table
pub const ANOMALY_TABLE_ROWS: usize = 10;

/// Score-to-threshold ratio above which an anomaly is flagged high
pub const HIGH_SEVERITY_RATIO: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_points: usize,
    pub anomaly_count: usize,
    /// `anomaly_count / total_points * 100`, 0 when there are no points
    pub anomaly_rate: f64,
    pub latest_value: Option<f64>,
    /// Mean of the newest ten values
    pub recent_average: Option<f64>,
}

impl StatsSummary {
    pub fn from_buffers(points: &[ChartPoint], anomalies: &[AnomalyRecord]) -> Self {
        let total_points = points.len();
        let anomaly_count = anomalies.len();
        let anomaly_rate = if total_points > 0 {
            anomaly_count as f64 / total_points as f64 * 100.0
        } else {
            0.0
        };

        let recent = &points[total_points.saturating_sub(RECENT_WINDOW)..];
        let recent_average = if recent.is_empty() {
            None
        } else {
            Some(recent.iter().map(ChartPoint::value).sum::<f64>() / recent.len() as f64)
        };

        Self {
            total_points,
            anomaly_count,
            anomaly_rate,
            latest_value: points.last().map(ChartPoint::value),
            recent_average,
        }
    }

    /// Anomaly rate with two decimals and a percent sign
    pub fn anomaly_rate_label(&self) -> String {
        format!("{:.2}%", self.anomaly_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Elevated,
}

impl Severity {
    pub fn classify(score: f64, threshold: f64) -> Self {
        if score > threshold * HIGH_SEVERITY_RATIO {
            Severity::High
        } else {
            Severity::Elevated
        }
    }
}

/// One formatted row of the recent-anomaly table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRow {
    pub time: String,
    pub value: String,
    pub score: String,
    pub threshold: String,
    pub severity: Severity,
}

impl AnomalyRow {
    pub fn from_record(record: &AnomalyRecord) -> Self {
        Self {
            time: record
                .timestamp
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
            value: format!("{:.3}", record.value),
            score: format!("{:.3}", record.score),
            threshold: format!("{:.3}", record.threshold),
            severity: Severity::classify(record.score, record.threshold),
        }
    }
}

/// Newest anomalies first, at most ten rows
pub fn recent_anomaly_rows(anomalies: &[AnomalyRecord]) -> Vec<AnomalyRow> {
    anomalies
        .iter()
        .rev()
        .take(ANOMALY_TABLE_ROWS)
        .map(AnomalyRow::from_record)
        .collect()
}
