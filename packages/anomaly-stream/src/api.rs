// REST side of the detection service

use crate::types::{StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const HEALTH_PATH: &str = "api/health";
const HEALTH_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// `{base}/api/health`, keeping any path prefix on the base URL
pub fn health_url(base_url: &str) -> StreamResult<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| StreamError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    let path = format!("{}/{}", url.path().trim_end_matches('/'), HEALTH_PATH);
    url.set_path(&path);
    url.set_query(None);
    Ok(url)
}

/// Ask the detection service whether it is up
pub async fn health_check(base_url: &str) -> StreamResult<HealthStatus> {
    let url = health_url(base_url)?;
    log::debug!("Checking service health at {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
        .build()
        .map_err(|e| StreamError::Http(e.to_string()))?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| StreamError::Http(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(StreamError::Http(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }

    let status = response
        .json::<HealthStatus>()
        .await
        .map_err(|e| StreamError::Http(format!("invalid health response: {}", e)))?;

    log::info!("Service at {} reports '{}'", base_url, status.status);
    Ok(status)
}
