use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::oauth::Authorizer;
use crate::sink::{PublishError, RecordSink};
use crate::timestamps::PublishTimestamps;
use crate::types::EquipmentRecord;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const APPLICATION_NAME: &str = "Samsara Google Sheets integration";

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid Sheets API URL for spreadsheet '{0}'")]
    InvalidUrl(String),

    #[error("Sheets {operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Sheets {operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
}

/// Thin client over the Sheets v4 `values` endpoints.
pub struct SheetsClient {
    http: Client,
    base_url: String,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub fn new(config: &Config) -> Result<Self, SheetsError> {
        let http = Client::builder()
            .user_agent(APPLICATION_NAME)
            .timeout(config.request_timeout)
            .build()
            .map_err(SheetsError::Client)?;
        Ok(Self::with_base_url(http, SHEETS_API_BASE, &config.sheet_id))
    }

    pub fn with_base_url(http: Client, base_url: &str, spreadsheet_id: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
        }
    }

    /// Clears every value in `range` (a sheet name clears the whole tab).
    pub fn clear_values(&self, access_token: &str, range: &str) -> Result<(), SheetsError> {
        let url = self.values_url(&format!("values/{range}:clear"))?;
        self.post(access_token, "clear", url, &json!({}))
    }

    /// Writes `rows` from the top-left of `range`, letting Sheets parse them as typed input.
    pub fn batch_update_values(
        &self,
        access_token: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        let url = self.values_url("values:batchUpdate")?;
        self.post(access_token, "batchUpdate", url, &batch_update_body(range, rows))
    }

    /// Appends `tail` as path segments below the spreadsheet, percent-encoding each one so
    /// sheet names with spaces or slashes stay intact.
    fn values_url(&self, tail: &str) -> Result<Url, SheetsError> {
        let invalid = || SheetsError::InvalidUrl(self.spreadsheet_id.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        {
            let (collection, operation) = tail.split_once('/').unwrap_or((tail, ""));
            let mut segments = url.path_segments_mut().map_err(|_| invalid())?;
            segments.push(&self.spreadsheet_id);
            segments.push(collection);
            if !operation.is_empty() {
                segments.push(operation);
            }
        }
        Ok(url)
    }

    fn post(
        &self,
        access_token: &str,
        operation: &'static str,
        url: Url,
        body: &Value,
    ) -> Result<(), SheetsError> {
        debug!(%url, operation, "Calling Sheets API");
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .map_err(|source| SheetsError::Request { operation, source })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .map_err(|source| SheetsError::Request { operation, source })?;
        Err(SheetsError::Status {
            operation,
            status: status.as_u16(),
            body,
        })
    }
}

/// One row per record: name, hours, km.
pub fn build_rows(records: &[EquipmentRecord]) -> Vec<Vec<String>> {
    records
        .iter()
        .map(|record| {
            vec![
                record.name.clone(),
                record.hours_display(),
                record.km_display(),
            ]
        })
        .collect()
}

pub fn batch_update_body(range: &str, rows: &[Vec<String>]) -> Value {
    json!({
        "valueInputOption": "USER_ENTERED",
        "data": [{
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        }],
    })
}

/// Replaces the contents of one sheet tab with the snapshot.
///
/// The clear and the write are separate calls: if the write fails the tab stays empty
/// until the next successful run.
pub struct SpreadsheetSink {
    client: SheetsClient,
    authorizer: Authorizer,
    sheet_name: String,
}

impl SpreadsheetSink {
    pub fn new(client: SheetsClient, authorizer: Authorizer, sheet_name: String) -> Self {
        Self {
            client,
            authorizer,
            sheet_name,
        }
    }
}

impl RecordSink for SpreadsheetSink {
    fn publish(
        &mut self,
        records: &[EquipmentRecord],
        _timestamps: &PublishTimestamps,
    ) -> Result<(), PublishError> {
        let rows = build_rows(records);
        let access_token = self.authorizer.access_token()?;

        self.client.clear_values(&access_token, &self.sheet_name)?;
        self.client
            .batch_update_values(&access_token, &self.sheet_name, &rows)?;

        info!(
            spreadsheet = %self.client.spreadsheet_id,
            sheet = %self.sheet_name,
            count = rows.len(),
            "Updated spreadsheet"
        );
        Ok(())
    }

    fn destination(&self) -> String {
        format!("{}!{}", self.client.spreadsheet_id, self.sheet_name)
    }
}
