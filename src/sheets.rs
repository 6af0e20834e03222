//! Thin synchronous wrapper around the Sheets v4 values API.
//!
//! Every operation is one HTTP call; nothing is retried, failures map to
//! user-facing errors (permission denied, sheet/range not found, or the raw
//! API status and message).

use log::{debug, info};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Authenticator;
use crate::error::FakturaError;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub type Rows = Vec<Vec<String>>;

pub struct SheetsClient {
    http: HttpClient,
    auth: Authenticator,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    #[serde(default, rename = "updatedCells")]
    updated_cells: u64,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<UpdateResponse>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    properties: Option<SheetProperties>,
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    #[serde(default)]
    properties: Option<SheetProperties>,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    #[serde(default)]
    title: String,
}

/// Spreadsheet metadata as returned by `describe`.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetInfo {
    pub spreadsheet_id: String,
    pub title: String,
    pub sheets: Vec<String>,
}

impl SheetsClient {
    pub fn new(auth: Authenticator) -> Self {
        Self {
            http: HttpClient::new(),
            auth,
        }
    }

    /// Occupied cell values of a range, as rows of strings.
    pub fn read(&self, spreadsheet_id: &str, range: &str) -> Result<Rows, FakturaError> {
        debug!("Reading {} range {}", spreadsheet_id, range);
        let url = format!(
            "{}/{}/values/{}",
            API_BASE,
            spreadsheet_id,
            encode_range(range)
        );
        let body: ValueRange = self.get(&url)?.json()?;
        let rows = stringify(body.values);
        info!("Read {} rows from range {}", rows.len(), range);
        Ok(rows)
    }

    /// Overwrites a range with the supplied rows (RAW input).
    pub fn write(&self, spreadsheet_id: &str, range: &str, rows: &Rows) -> Result<u64, FakturaError> {
        debug!("Writing {} rows to {} range {}", rows.len(), spreadsheet_id, range);
        let url = format!(
            "{}/{}/values/{}",
            API_BASE,
            spreadsheet_id,
            encode_range(range)
        );
        let token = self.auth.token(&self.http)?;
        let response = self
            .http
            .put(&url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": rows }))
            .send()?;
        let body: UpdateResponse = Self::check(response)?.json()?;
        info!("Updated {} cells in range {}", body.updated_cells, range);
        Ok(body.updated_cells)
    }

    /// Appends rows after the last occupied row within a range.
    pub fn append(&self, spreadsheet_id: &str, range: &str, rows: &Rows) -> Result<u64, FakturaError> {
        debug!("Appending {} rows to {} range {}", rows.len(), spreadsheet_id, range);
        let url = format!(
            "{}/{}/values/{}:append",
            API_BASE,
            spreadsheet_id,
            encode_range(range)
        );
        let token = self.auth.token(&self.http)?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": rows }))
            .send()?;
        let body: AppendResponse = Self::check(response)?.json()?;
        let cells = body.updates.map(|u| u.updated_cells).unwrap_or_default();
        info!("Appended {} cells to range {}", cells, range);
        Ok(cells)
    }

    /// Blanks a range.
    pub fn clear(&self, spreadsheet_id: &str, range: &str) -> Result<(), FakturaError> {
        debug!("Clearing {} range {}", spreadsheet_id, range);
        let url = format!(
            "{}/{}/values/{}:clear",
            API_BASE,
            spreadsheet_id,
            encode_range(range)
        );
        let token = self.auth.token(&self.http)?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({}))
            .send()?;
        Self::check(response)?;
        info!("Cleared range {}", range);
        Ok(())
    }

    /// Spreadsheet title and the titles of its sheets.
    pub fn describe(&self, spreadsheet_id: &str) -> Result<SheetInfo, FakturaError> {
        debug!("Describing {}", spreadsheet_id);
        let url = format!("{}/{}", API_BASE, spreadsheet_id);
        let meta: SpreadsheetMeta = self.get(&url)?.json()?;
        let info = SheetInfo {
            spreadsheet_id: spreadsheet_id.to_string(),
            title: meta.properties.map(|p| p.title).unwrap_or_default(),
            sheets: meta
                .sheets
                .into_iter()
                .filter_map(|s| s.properties.map(|p| p.title))
                .collect(),
        };
        info!(
            "Spreadsheet '{}' has {} sheets",
            info.title,
            info.sheets.len()
        );
        Ok(info)
    }

    /// Reads a range into a tabular frame with a configurable header row.
    pub fn read_frame(
        &self,
        spreadsheet_id: &str,
        range: &str,
        header_row: usize,
    ) -> Result<Frame, FakturaError> {
        Ok(Frame::from_rows(self.read(spreadsheet_id, range)?, header_row))
    }

    fn get(&self, url: &str) -> Result<Response, FakturaError> {
        let token = self.auth.token(&self.http)?;
        Self::check(self.http.get(url).bearer_auth(token).send()?)
    }

    fn check(response: Response) -> Result<Response, FakturaError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiErrorBody>()
            .map(|body| body.error.message)
            .unwrap_or_else(|_| status.to_string());
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                FakturaError::PermissionDenied { message }
            }
            StatusCode::NOT_FOUND => FakturaError::SheetNotFound { message },
            _ => FakturaError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }
}

/// Rows marshalled against a header row, addressable by column name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub headers: Vec<String>,
    pub rows: Rows,
}

impl Frame {
    pub fn from_rows(rows: Rows, header_row: usize) -> Self {
        if rows.len() > header_row {
            let mut rows = rows;
            let data = rows.split_off(header_row + 1);
            let headers = rows.swap_remove(header_row);
            Self {
                headers,
                rows: data,
            }
        } else {
            Self {
                headers: Vec::new(),
                rows,
            }
        }
    }

    pub fn to_rows(&self, include_header: bool) -> Rows {
        let mut out = Rows::new();
        if include_header {
            out.push(self.headers.clone());
        }
        out.extend(self.rows.iter().cloned());
        out
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column(column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Extracts the spreadsheet id from a full sheet URL; bare ids pass through.
pub fn extract_spreadsheet_id(url: &str) -> &str {
    match url.split_once("/spreadsheets/d/") {
        Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or(rest),
        None => url,
    }
}

/// Percent-encodes a range expression for use as a URL path segment. Sheet
/// titles may contain spaces and non-ASCII characters.
fn encode_range(range: &str) -> String {
    let mut out = String::with_capacity(range.len());
    for byte in range.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(byte as char),
            b'-' | b'.' | b'_' | b'~' | b'!' | b'\'' | b'(' | b')' | b'*' | b':' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn stringify(values: Vec<Vec<Value>>) -> Rows {
    values
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/170onDFFCveCzV6Q9F1_IhsG2LBRcw5MYxJbyocVJmq0/edit?gid=0#gid=0";

    #[test]
    fn spreadsheet_id_from_url() {
        assert_eq!(
            extract_spreadsheet_id(SHEET_URL),
            "170onDFFCveCzV6Q9F1_IhsG2LBRcw5MYxJbyocVJmq0"
        );
    }

    #[test]
    fn spreadsheet_id_without_trailing_path() {
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/abc123"),
            "abc123"
        );
        assert_eq!(
            extract_spreadsheet_id("https://docs.google.com/spreadsheets/d/abc123?gid=0"),
            "abc123"
        );
    }

    #[test]
    fn bare_id_passes_through() {
        assert_eq!(extract_spreadsheet_id("abc123"), "abc123");
    }

    #[test]
    fn range_encoding() {
        assert_eq!(encode_range("Kunder!A:I"), "Kunder!A:I");
        assert_eq!(
            encode_range("Company Details!A2:M2"),
            "Company%20Details!A2:M2"
        );
        assert_eq!(encode_range("Åbne!A1"), "%C3%85bne!A1");
    }

    fn sample_rows() -> Rows {
        vec![
            vec!["Date".to_string(), "Item".to_string(), "Total".to_string()],
            vec!["2024-01-05".to_string(), "Widget".to_string(), "100".to_string()],
            vec!["2024-01-06".to_string(), "Gadget".to_string(), "250".to_string()],
        ]
    }

    #[test]
    fn frame_from_rows() {
        let frame = Frame::from_rows(sample_rows(), 0);
        assert_eq!(frame.headers, vec!["Date", "Item", "Total"]);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get(1, "Item"), Some("Gadget"));
        assert_eq!(frame.get(0, "Missing"), None);
    }

    #[test]
    fn frame_round_trip() {
        let frame = Frame::from_rows(sample_rows(), 0);
        assert_eq!(frame.to_rows(true), sample_rows());
    }

    #[test]
    fn frame_header_row_out_of_bounds() {
        let frame = Frame::from_rows(sample_rows(), 5);
        assert!(frame.headers.is_empty());
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn stringify_mixed_cells() {
        let values = vec![vec![
            Value::String("a".to_string()),
            Value::Number(42.into()),
            Value::Null,
        ]];
        assert_eq!(stringify(values), vec![vec!["a", "42", ""]]);
    }
}
