//! HTTP client for the data service's export endpoint.

use async_trait::async_trait;
use chrono::NaiveDate;
use enpull_core::{RecordKind, format_day};
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::{ExportBatch, ExportSource, SyncError, parse_export};

/// Content type requested from the export service.
pub const CONTENT_TYPE: &str = "xml";

/// Client for the export endpoint, authenticated by a service token.
pub struct ExportClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ExportClient {
    /// Create a client for the export endpoint at `base_url`
    /// (e.g. `https://www.e-activist.com/ea-dataservice/export.service`).
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Build the export request for one day of one record type.
    ///
    /// The end date is exclusive unless it equals the start date, so a single
    /// day is requested with both set to that day.
    fn request(&self, day: NaiveDate, kind: RecordKind) -> reqwest::RequestBuilder {
        let day = format_day(day);
        self.client.get(&self.base_url).query(&[
            ("token", self.token.as_str()),
            ("startDate", day.as_str()),
            ("endDate", day.as_str()),
            ("type", CONTENT_TYPE),
            ("configTypes", kind.code()),
        ])
    }
}

#[async_trait]
impl ExportSource for ExportClient {
    async fn fetch(&self, day: NaiveDate, kind: RecordKind) -> Result<ExportBatch, SyncError> {
        // The token is a query parameter, so only the base URL is logged.
        info!(url = %self.base_url, day = %format_day(day), %kind, "requesting export");
        let resp = self.request(day, kind).send().await?;
        let status = resp.status();
        if !status.is_success() {
            // Body is best effort here.
            let body = resp.text().await.unwrap_or_default();
            return batch_from_response(status, &body);
        }
        let body = resp.text().await?;
        batch_from_response(status, &body)
    }
}

/// Interpret an export response. A non-success status fails the batch the
/// same way an `<error>` element in the document does.
fn batch_from_response(status: StatusCode, body: &str) -> Result<ExportBatch, SyncError> {
    if !status.is_success() {
        warn!(status = status.as_u16(), "export request rejected");
        return Ok(ExportBatch::Failed(format!(
            "server returned {}: {}",
            status.as_u16(),
            body.trim()
        )));
    }
    parse_export(body)
}
