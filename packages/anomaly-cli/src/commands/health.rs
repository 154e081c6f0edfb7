use crate::cli::HealthArgs;
use crate::exit_codes;
use crate::output;
use anomaly_stream::api;
use anomaly_stream::{DashboardConfig, StreamError};
use serde::Serialize;

#[derive(Serialize)]
struct HealthReport<'a> {
    url: &'a str,
    status: &'a str,
    healthy: bool,
}

pub async fn execute(args: HealthArgs) -> i32 {
    let url = match args.url {
        Some(url) => url,
        None => match DashboardConfig::from_env() {
            Ok(config) => config.api_url,
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::INPUT_ERROR;
            }
        },
    };

    let status = match api::health_check(&url).await {
        Ok(status) => status,
        Err(e @ StreamError::InvalidUrl(_)) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONNECTION_ERROR;
        }
    };

    let text = if args.json {
        let report = HealthReport {
            url: &url,
            status: &status.status,
            healthy: status.is_healthy(),
        };
        match output::to_json(&report, false) {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        }
    } else {
        format!("{}: {}", url, status.status)
    };

    if let Err(e) = output::write_output(&text, None) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }

    if status.is_healthy() {
        exit_codes::SUCCESS
    } else {
        exit_codes::CONNECTION_ERROR
    }
}
