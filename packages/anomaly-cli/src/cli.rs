use anomaly_stream::ModelType;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "anomaly-dash",
    version,
    about = "Headless driver for the live anomaly-detection dashboard",
    long_about = "Stream data points from an anomaly-detection service, keep the dashboard's\n\
                  sliding windows, raise alerts and render the live chart as SVG.\n\
                  Set $ANOMALY_API_URL or use --url to choose the service."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect to the service, start a stream and follow it
    Watch(WatchArgs),
    /// Render newline-delimited data points to an SVG chart
    Render(RenderArgs),
    /// Check whether the service is up
    Health(HealthArgs),
}

#[derive(Args)]
pub struct WatchArgs {
    /// Base URL of the detection service (default: $ANOMALY_API_URL or http://localhost:5000)
    #[arg(long)]
    pub url: Option<String>,

    /// Number of points the service should generate
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u32).range(10..=10000))]
    pub num_points: u32,

    /// Emission interval in milliseconds (10-5000, steps of 10)
    #[arg(long, default_value_t = 100, value_parser = parse_interval)]
    pub interval_ms: u32,

    /// Ask the service to inject anomalies (default)
    #[arg(long, overrides_with = "no_anomalies")]
    pub include_anomalies: bool,

    /// Ask the service not to inject anomalies
    #[arg(long, overrides_with = "include_anomalies")]
    pub no_anomalies: bool,

    /// Detection model (isolation_forest, lstm)
    #[arg(long, default_value = "isolation_forest")]
    pub model_type: ModelType,

    /// Detection window size
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(10..=1000))]
    pub window_size: u32,

    /// Detection threshold (0.01-1)
    #[arg(long, default_value_t = 0.05, value_parser = parse_threshold)]
    pub threshold: f64,

    /// Rewrite this SVG file after every data point
    #[arg(long)]
    pub svg: Option<String>,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Give up if the service has not acknowledged the connection by then
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

impl WatchArgs {
    /// Anomalies are on unless the last of the two flags turned them off
    pub fn anomalies_enabled(&self) -> bool {
        self.include_anomalies || !self.no_anomalies
    }
}

#[derive(Args)]
pub struct RenderArgs {
    /// Newline-delimited data_point JSON (default: stdin)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Output SVG file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Chart width in pixels (default: $ANOMALY_CHART_WIDTH or 800)
    #[arg(long)]
    pub width: Option<f64>,

    /// Chart height in pixels (default: $ANOMALY_CHART_HEIGHT or 300)
    #[arg(long)]
    pub height: Option<f64>,

    /// Points kept in the window (default: $ANOMALY_MAX_POINTS or 100)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_points: Option<u64>,

    /// Suppress the summary line on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct HealthArgs {
    /// Base URL of the detection service (default: $ANOMALY_API_URL or http://localhost:5000)
    #[arg(long)]
    pub url: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

fn parse_interval(raw: &str) -> Result<u32, String> {
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a whole number of milliseconds", raw))?;
    if !(10..=5000).contains(&value) || value % 10 != 0 {
        return Err(format!(
            "{} is not between 10 and 5000 in steps of 10",
            value
        ));
    }
    Ok(value)
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if !(0.01..=1.0).contains(&value) {
        return Err(format!("{} is not between 0.01 and 1", value));
    }
    Ok(value)
}
