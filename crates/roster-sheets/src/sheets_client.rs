//! Sheets REST client: full-table reads, single-cell reads and writes, and
//! row background markers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use roster_core::{
    is_retryable_status, parse_retry_after, retry_delay, truncate_for_error,
    RETRY_ATTEMPT_HEADER,
};
use roster_engine::{RecordStore, RowIndex, RowMarker, Snapshot, StoreError};

use crate::a1_notation::{cell_range, column_letters, encode_range_for_path, quote_sheet_name};

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    /// Tab name used in A1 ranges.
    pub sheet_name: String,
    /// Numeric tab id (`gid`) required by formatting requests.
    pub sheet_gid: i64,
    pub access_token: String,
    /// Last column read by snapshots and painted by row markers.
    pub last_column: u32,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_SHEETS_API_BASE.to_string(),
            spreadsheet_id: String::new(),
            sheet_name: "Sheet1".to_string(),
            sheet_gid: 0,
            access_token: String::new(),
            last_column: 26,
            request_timeout_ms: 10_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct UpdateValuesResponse {
    #[serde(default, rename = "updatedCells")]
    updated_cells: u64,
}

#[derive(Clone)]
pub struct SheetsRecordStore {
    http: reqwest::Client,
    config: SheetsConfig,
}

impl std::fmt::Debug for SheetsRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsRecordStore")
            .field("spreadsheet_id", &self.config.spreadsheet_id)
            .field("sheet_name", &self.config.sheet_name)
            .finish_non_exhaustive()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

impl SheetsRecordStore {
    pub fn new(config: SheetsConfig) -> Result<Self, StoreError> {
        if config.spreadsheet_id.trim().is_empty() {
            return Err(StoreError::Request(
                "spreadsheet id cannot be empty".to_string(),
            ));
        }
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("roster-sheets"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|error| StoreError::Request(format!("failed to build http client: {error}")))?;
        Ok(Self {
            http,
            config: SheetsConfig {
                api_base: config.api_base.trim_end_matches('/').to_string(),
                retry_max_attempts: config.retry_max_attempts.max(1),
                ..config
            },
        })
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}",
            self.config.api_base,
            encode_range_for_path(self.config.spreadsheet_id.trim())
        )
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            encode_range_for_path(range)
        )
    }

    fn table_range(&self) -> String {
        format!(
            "{}!A:{}",
            quote_sheet_name(&self.config.sheet_name),
            column_letters(self.config.last_column.max(1))
        )
    }

    fn check_cell(row: RowIndex, column: u32) -> Result<(), StoreError> {
        if row == 0 || column == 0 {
            return Err(StoreError::InvalidCell { row, column });
        }
        Ok(())
    }

    async fn request_json<T, F>(&self, operation: &str, build: F) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = build()
                .bearer_auth(&self.config.access_token)
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<T>().await.map_err(|error| {
                            StoreError::Decode(format!("sheets {operation}: {error}"))
                        });
                    }
                    let retry_after = parse_retry_after(
                        response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|value| value.to_str().ok()),
                    );
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.config.retry_max_attempts
                        && is_retryable_status(status.as_u16())
                    {
                        debug!(operation, attempt, status = status.as_u16(), "retrying sheets request");
                        tokio::time::sleep(retry_delay(
                            self.config.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    return Err(StoreError::Status {
                        status: status.as_u16(),
                        body: truncate_for_error(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.config.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.config.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    if error.is_timeout() {
                        return Err(StoreError::Timeout(self.config.request_timeout_ms));
                    }
                    return Err(StoreError::Request(format!("sheets {operation}: {error}")));
                }
            }
        }
    }
}

#[async_trait]
impl RecordStore for SheetsRecordStore {
    async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let url = self.values_url(&self.table_range());
        let response: ValueRangeResponse = self
            .request_json("values.get", || {
                self.http
                    .get(url.as_str())
                    .query(&[("majorDimension", "ROWS")])
            })
            .await?;
        debug!(rows = response.values.len(), "sheets snapshot loaded");
        Ok(response
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn get_cell(&self, row: RowIndex, column: u32) -> Result<String, StoreError> {
        Self::check_cell(row, column)?;
        let url = self.values_url(&cell_range(&self.config.sheet_name, row, column));
        let response: ValueRangeResponse = self
            .request_json("values.get", || self.http.get(url.as_str()))
            .await?;
        Ok(response
            .values
            .first()
            .and_then(|cells| cells.first())
            .map(cell_text)
            .unwrap_or_default())
    }

    async fn set_cell(&self, row: RowIndex, column: u32, value: &str) -> Result<(), StoreError> {
        Self::check_cell(row, column)?;
        let range = cell_range(&self.config.sheet_name, row, column);
        let url = self.values_url(&range);
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });
        let response: UpdateValuesResponse = self
            .request_json("values.update", || {
                self.http
                    .put(url.as_str())
                    .query(&[("valueInputOption", "RAW")])
                    .json(&body)
            })
            .await?;
        debug!(range = %range, updated_cells = response.updated_cells, "sheets cell written");
        Ok(())
    }

    async fn set_row_marker(&self, row: RowIndex, marker: RowMarker) -> Result<(), StoreError> {
        Self::check_cell(row, 1)?;
        let (red, green, blue) = marker.unit_rgb();
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let body = json!({
            "requests": [{
                "repeatCell": {
                    "range": {
                        "sheetId": self.config.sheet_gid,
                        "startRowIndex": row - 1,
                        "endRowIndex": row,
                        "startColumnIndex": 0,
                        "endColumnIndex": self.config.last_column.max(1),
                    },
                    "cell": {
                        "userEnteredFormat": {
                            "backgroundColor": {"red": red, "green": green, "blue": blue}
                        }
                    },
                    "fields": "userEnteredFormat.backgroundColor",
                }
            }]
        });
        let _: Value = self
            .request_json("batchUpdate", || self.http.post(url.as_str()).json(&body))
            .await?;
        debug!(row, color = %marker.to_hex(), "sheets row marker applied");
        Ok(())
    }
}
