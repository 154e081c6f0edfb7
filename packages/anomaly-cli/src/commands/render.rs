use crate::cli::RenderArgs;
use crate::exit_codes;
use crate::output;
use anomaly_stream::{ChartRenderer, DashboardConfig, DataPoint, StreamingBuffer};
use parking_lot::Mutex;
use std::sync::Arc;

pub fn execute(args: RenderArgs) -> i32 {
    let mut config = match DashboardConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };
    if let Some(width) = args.width {
        config.chart_width = width;
    }
    if let Some(height) = args.height {
        config.chart_height = height;
    }
    if let Some(max_points) = args.max_points {
        config.max_points = max_points as usize;
    }
    if !(config.chart_width > 0.0 && config.chart_height > 0.0) {
        eprintln!("Error: chart dimensions must be positive");
        return exit_codes::INPUT_ERROR;
    }

    let input = match output::read_input(args.input.as_deref()) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let renderer = Arc::new(Mutex::new(ChartRenderer::new(config.chart_config())));
    let mut buffer = StreamingBuffer::new(config.max_points, config.max_anomalies);
    buffer.subscribe_points(renderer.clone());

    let mut skipped = 0usize;
    for (number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DataPoint>(line) {
            Ok(point) => {
                buffer.append_point(point);
            }
            Err(e) => {
                log::warn!("Skipping line {}: {}", number + 1, e);
                skipped += 1;
            }
        }
    }

    let svg = renderer.lock().to_svg();
    if let Err(e) = output::write_output(svg.trim_end(), args.output.as_deref()) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }
    if let Some(path) = &args.output {
        log::info!("Chart written to {}", path);
    }

    if !args.quiet {
        let metrics = buffer.point_metrics();
        eprintln!(
            "Rendered {} of {} points ({} skipped)",
            metrics.current_size, metrics.total_pushed, skipped
        );
    }

    exit_codes::SUCCESS
}
