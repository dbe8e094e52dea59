//! Range store over the spreadsheet REST API.
//!
//! Endpoints follow the Sheets v4 layout:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | read | `GET {base}/spreadsheets/{id}/values/{range}` |
//! | append | `POST {base}/spreadsheets/{id}/values/{range}:append` |
//! | overwrite | `PUT {base}/spreadsheets/{id}/values/{range}` |
//! | batch overwrite | `POST {base}/spreadsheets/{id}/values:batchUpdate` |
//! | delete row | `POST {base}/spreadsheets/{id}:batchUpdate` (`deleteDimension`) |
//! | metadata | `GET {base}/spreadsheets/{id}?fields=sheets.properties` |

use super::{RangeStore, RangeUpdate, SheetProperties};
use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tabula_engine::{RangeExpr, RawRow, SheetId};

/// Range store talking to the remote API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRangeStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: Option<String>,
    request_timeout: Duration,
}

/// Body of a values read or write.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_dimension: Option<String>,
    #[serde(default)]
    pub values: Vec<RawRow>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchValuesRequest {
    pub value_input_option: String,
    pub data: Vec<ValueRange>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

impl HttpRangeStore {
    pub fn new(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        access_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token,
            request_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_base_url.clone(),
            config.spreadsheet_id.clone(),
            config.access_token.clone(),
            config.request_timeout,
        )
    }

    /// `{base}/spreadsheets/` followed by `segments`, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/spreadsheets", self.base_url))
            .map_err(|e| Error::Transport(format!("invalid base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Transport("base url cannot carry a path".to_string()))?
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &RangeExpr, suffix: &str) -> Result<Url> {
        let segment = format!("{}{}", range, suffix);
        self.endpoint(&[&self.spreadsheet_id, "values", &segment])
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| self.failure(e))?;
        check_status(response).await
    }

    async fn body<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        response.json().await.map_err(|e| self.failure(e))
    }

    fn failure(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.request_timeout)
        } else {
            Error::from(e)
        }
    }
}

/// Map an HTTP failure status onto the client's error taxonomy.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, body))
}

pub(crate) fn classify(status: StatusCode, body: String) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(body),
        // Unknown table title, or a sheet id that no longer exists.
        StatusCode::BAD_REQUEST
            if body.contains("Unable to parse range") || body.contains("No grid with id") =>
        {
            Error::NotFound(body)
        }
        StatusCode::BAD_REQUEST => Error::Rejected {
            status: status.as_u16(),
            message: body,
        },
        _ => Error::Transport(format!("HTTP {}: {}", status.as_u16(), body)),
    }
}

#[async_trait]
impl RangeStore for HttpRangeStore {
    async fn read_range(&self, range: &RangeExpr) -> Result<Vec<RawRow>> {
        tracing::debug!(range = %range, "Reading range");
        let url = self.values_url(range, "")?;
        let request = self.client.get(url).query(&[
            ("majorDimension", "ROWS"),
            ("valueRenderOption", "UNFORMATTED_VALUE"),
        ]);
        let response = self.send(request).await?;
        let body: ValueRange = self.body(response).await?;
        Ok(body.values)
    }

    async fn append_rows(&self, range: &RangeExpr, rows: &[RawRow]) -> Result<()> {
        tracing::debug!(range = %range, rows = rows.len(), "Appending rows");
        let url = self.values_url(range, ":append")?;
        let request = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }));
        self.send(request).await?;
        Ok(())
    }

    async fn overwrite_range(&self, range: &RangeExpr, rows: &[RawRow]) -> Result<()> {
        tracing::debug!(range = %range, rows = rows.len(), "Overwriting range");
        let url = self.values_url(range, "")?;
        let body = ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".to_string()),
            values: rows.to_vec(),
        };
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn batch_overwrite(&self, updates: &[RangeUpdate]) -> Result<()> {
        tracing::debug!(ranges = updates.len(), "Batch overwrite");
        let url = self.endpoint(&[&self.spreadsheet_id, "values:batchUpdate"])?;
        let body = BatchValuesRequest {
            value_input_option: "RAW".to_string(),
            data: updates
                .iter()
                .map(|u| ValueRange {
                    range: Some(u.range.to_string()),
                    major_dimension: Some("ROWS".to_string()),
                    values: u.rows.clone(),
                })
                .collect(),
        };
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn delete_row(&self, sheet_id: SheetId, positional_index: u32) -> Result<()> {
        tracing::debug!(sheet_id, positional_index, "Deleting row");
        let target = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.endpoint(&[&target])?;
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": positional_index,
                        "endIndex": positional_index + 1,
                    }
                }
            }]
        });
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn sheet_metadata(&self) -> Result<Vec<SheetProperties>> {
        tracing::debug!("Fetching sheet metadata");
        let url = self.endpoint(&[&self.spreadsheet_id])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "sheets.properties")]);
        let response = self.send(request).await?;
        let body: SpreadsheetMetadata = self.body(response).await?;
        Ok(body.sheets.into_iter().map(|s| s.properties).collect())
    }
}
