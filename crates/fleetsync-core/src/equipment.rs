use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::types::EquipmentRecord;

/// Fleet equipment stats endpoint, restricted to the two metrics we publish.
pub const EQUIPMENT_STATS_URL: &str =
    "https://api.samsara.com/fleet/equipment/stats?types=gpsOdometerMeters,gatewayEngineSeconds";

const ODOMETER_METRIC: &str = "gpsOdometerMeters";
const ENGINE_SECONDS_METRIC: &str = "gatewayEngineSeconds";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("equipment request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("equipment API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("equipment response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("equipment response has no `data` array")]
    MissingData,

    #[error("equipment entry {index} is malformed: {reason}")]
    MalformedEntry { index: usize, reason: String },
}

/// Anything that can produce the current fleet snapshot.
pub trait EquipmentSource {
    fn fetch_equipment(&self) -> Result<Vec<EquipmentRecord>, FetchError>;
}

/// Blocking client for the Samsara fleet API.
pub struct SamsaraClient {
    client: Client,
    url: String,
    auth_token: String,
}

impl SamsaraClient {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        // No timeout unless configured; the blocking client would otherwise default to 30s.
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            url: config.samsara_api_url.clone(),
            auth_token: config.samsara_auth_token.clone(),
        })
    }
}

impl EquipmentSource for SamsaraClient {
    fn fetch_equipment(&self) -> Result<Vec<EquipmentRecord>, FetchError> {
        debug!(url = %self.url, "Requesting equipment stats");

        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.auth_token)
            .send()
            .map_err(FetchError::Request)?;

        let status = response.status();
        let body = response.text().map_err(FetchError::Request)?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let records = parse_equipment_stats(&body)?;
        info!(count = records.len(), "Fetched equipment stats");
        Ok(records)
    }
}

/// Converts an equipment stats response body into records, preserving API order.
///
/// Any entry without a string `name` or with a non-numeric metric value fails the whole
/// batch so that a partial snapshot is never published.
pub fn parse_equipment_stats(body: &str) -> Result<Vec<EquipmentRecord>, FetchError> {
    let payload: Value = serde_json::from_str(body)?;
    let entries = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or(FetchError::MissingData)?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_entry(index, entry))
        .collect()
}

fn parse_entry(index: usize, entry: &Value) -> Result<EquipmentRecord, FetchError> {
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::MalformedEntry {
            index,
            reason: "missing string `name`".to_string(),
        })?;

    let meters = metric_value(index, entry, ODOMETER_METRIC)?;
    let seconds = metric_value(index, entry, ENGINE_SECONDS_METRIC)?;

    Ok(EquipmentRecord::from_raw(name, meters, seconds))
}

fn metric_value(index: usize, entry: &Value, metric: &str) -> Result<f64, FetchError> {
    let malformed = |reason: String| FetchError::MalformedEntry { index, reason };

    let value = entry
        .get(metric)
        .and_then(|m| m.get("value"))
        .ok_or_else(|| malformed(format!("missing `{metric}.value`")))?;

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(malformed(format!("`{metric}.value` is not numeric: {value}"))),
    }
}
