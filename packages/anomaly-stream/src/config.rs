use crate::buffer::{DEFAULT_ANOMALY_CAPACITY, DEFAULT_POINT_CAPACITY};
use crate::chart::{ChartConfig, Margin};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Dashboard configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the detection service
    pub api_url: String,
    /// Data-point window capacity, also the chart's x-axis length
    pub max_points: usize,
    /// Anomaly window capacity
    pub max_anomalies: usize,
    pub chart_width: f64,
    pub chart_height: f64,
    /// Alert auto-dismiss delay in milliseconds
    pub alert_ttl_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            max_points: DEFAULT_POINT_CAPACITY,
            max_anomalies: DEFAULT_ANOMALY_CAPACITY,
            chart_width: 800.0,
            chart_height: 300.0,
            alert_ttl_ms: 5000,
        }
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("ANOMALY_API_URL").unwrap_or(defaults.api_url);
        url::Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidValue(format!("ANOMALY_API_URL: {}", e)))?;

        let config = Self {
            api_url,
            max_points: parse_var(&lookup, "ANOMALY_MAX_POINTS", defaults.max_points)?,
            max_anomalies: parse_var(&lookup, "ANOMALY_MAX_ANOMALIES", defaults.max_anomalies)?,
            chart_width: parse_var(&lookup, "ANOMALY_CHART_WIDTH", defaults.chart_width)?,
            chart_height: parse_var(&lookup, "ANOMALY_CHART_HEIGHT", defaults.chart_height)?,
            alert_ttl_ms: parse_var(&lookup, "ANOMALY_ALERT_TTL_MS", defaults.alert_ttl_ms)?,
        };

        if config.max_points == 0 || config.max_anomalies == 0 {
            return Err(ConfigError::InvalidValue(
                "window capacities must be at least 1".to_string(),
            ));
        }
        if !(config.chart_width > 0.0 && config.chart_height > 0.0) {
            return Err(ConfigError::InvalidValue(
                "chart dimensions must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn chart_config(&self) -> ChartConfig {
        ChartConfig {
            width: self.chart_width,
            height: self.chart_height,
            margin: Margin::default(),
            max_points: self.max_points,
        }
    }

    pub fn alert_ttl(&self) -> Duration {
        Duration::from_millis(self.alert_ttl_ms)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}={}", key, raw))),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
