use crate::cli::WatchArgs;
use crate::exit_codes;
use crate::output;
use anomaly_stream::client::EventKind;
use anomaly_stream::{
    AnomalyRow, DashboardConfig, DashboardSession, DetectionSettings, LogToastSink, RunExit,
    SimulationSettings, StatsSummary, StreamError,
};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Serialize)]
struct WatchReport {
    session_id: String,
    url: String,
    exit: String,
    stats: StatsSummary,
    anomaly_rate: String,
    recent_anomalies: Vec<AnomalyRow>,
}

pub async fn execute(args: WatchArgs) -> i32 {
    let mut config = match DashboardConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };
    if let Some(url) = &args.url {
        config.api_url = url.clone();
    }

    let settings = SimulationSettings {
        num_points: args.num_points,
        include_anomalies: args.anomalies_enabled(),
        interval_ms: args.interval_ms,
    };
    let detection = DetectionSettings {
        model_type: args.model_type,
        window_size: args.window_size,
        threshold: args.threshold,
    };

    let mut session = DashboardSession::websocket(config);
    session.set_detection(detection);
    session.add_toast_sink(LogToastSink);

    match session.connect().await {
        Ok(()) => {}
        Err(e @ StreamError::InvalidUrl(_)) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONNECTION_ERROR;
        }
    }

    let timeout = Duration::from_secs(args.connect_timeout_secs);
    match tokio::time::timeout(timeout, session.wait_until_connected()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONNECTION_ERROR;
        }
        Err(_) => {
            eprintln!(
                "Error: {} did not acknowledge the connection within {}s",
                session.url(),
                args.connect_timeout_secs
            );
            return exit_codes::CONNECTION_ERROR;
        }
    }

    if let Err(e) = session.start_stream(settings) {
        eprintln!("Error: {}", e);
        return exit_codes::CONNECTION_ERROR;
    }

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });
    if let Some(secs) = args.duration_secs {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            on_timeout.cancel();
        });
    }

    let svg_path = args.svg.clone();
    let exit = session
        .run(&cancel, |session, kind| {
            if kind != EventKind::DataPoint {
                return;
            }
            if let Some(path) = &svg_path {
                match output::write_output(&session.svg(), Some(path)) {
                    Ok(()) => log::info!("Snapshot written to {}", path),
                    Err(e) => log::error!("{}", e),
                }
            }
        })
        .await;

    // Stop goes out before the connection is closed
    session.close();

    let stats = session.stats();
    let report = WatchReport {
        session_id: session.id().to_string(),
        url: session.url().to_string(),
        exit: match &exit {
            RunExit::Cancelled => "stopped".to_string(),
            RunExit::Disconnected { reason } => format!("disconnected: {}", reason),
        },
        anomaly_rate: stats.anomaly_rate_label(),
        stats,
        recent_anomalies: session.anomaly_rows(),
    };

    match output::to_json(&report, args.compact) {
        Ok(json) => {
            if let Err(e) = output::write_output(&json, None) {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    }

    match exit {
        RunExit::Cancelled => exit_codes::SUCCESS,
        RunExit::Disconnected { reason } => {
            eprintln!("Connection lost: {}", reason);
            exit_codes::CONNECTION_ERROR
        }
    }
}
