//! Remote spreadsheet ledger reached over HTTP.
//!
//! The endpoint is a small web app in front of the spreadsheet:
//! - `GET ?action=test` reports row counts
//! - `GET ?action=shortcodes[&tab=NAME]` lists recorded identifiers
//! - `POST {headers, rows, tab}` appends rows to a tab
//!
//! Every request carries the pre-shared credential as the `key` parameter.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::LogRow;

use super::{HealthReport, Ledger, LedgerError, PartitionSnapshot};

const HTML_MISCONFIGURED: &str = "endpoint returned an HTML page instead of JSON; \
     make sure the script is deployed as a web app that anyone can access";

/// Response to `?action=test`
#[derive(Debug, Deserialize)]
struct TestResponse {
    ok: bool,
    #[serde(default)]
    count: u64,
    #[serde(default)]
    counts: BTreeMap<String, u64>,
    error: Option<String>,
}

/// Response to `?action=shortcodes`
#[derive(Debug, Deserialize)]
struct ShortcodesResponse {
    ok: Option<bool>,
    #[serde(default)]
    shortcodes: Vec<String>,
    error: Option<String>,
}

/// Response to an append
#[derive(Debug, Deserialize)]
struct AppendResponse {
    ok: bool,
    added: Option<usize>,
    error: Option<String>,
}

/// Body of an append
#[derive(Debug, Serialize)]
struct AppendRequest<'a> {
    headers: &'a [String],
    rows: &'a [LogRow],
    tab: &'a str,
}

/// HTTP ledger client
pub struct HttpLedger {
    url: String,
    credential: Option<String>,
    partitions: Vec<String>,
    timeout_seconds: u64,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLedger")
            .field("url", &self.url)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .field("partitions", &self.partitions)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl HttpLedger {
    /// Create a client.
    ///
    /// `partitions` are the tabs read for duplicate detection; when empty the
    /// endpoint's unioned listing is used instead.
    pub fn new(
        url: impl Into<String>,
        credential: Option<String>,
        partitions: Vec<String>,
        timeout_seconds: u64,
    ) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            credential: credential.filter(|c| !c.trim().is_empty()),
            partitions,
            timeout_seconds,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the request URL with the given query parameters plus the credential
    fn request_url(&self, params: &[(&str, &str)]) -> Result<Url, LedgerError> {
        let mut all: Vec<(&str, &str)> = params.to_vec();
        if let Some(key) = &self.credential {
            all.push(("key", key.as_str()));
        }
        Url::parse_with_params(&self.url, &all)
            .map_err(|e| LedgerError::InvalidResponse(format!("invalid ledger URL {}: {}", self.url, e)))
    }

    async fn get<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, LedgerError> {
        let url = self.request_url(params)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.read_body(response).await
    }

    async fn read_body<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, LedgerError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if status.is_server_error() {
            return Err(LedgerError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(LedgerError::InvalidResponse(format!("HTTP {}", status)));
        }
        parse_body(&body)
    }

    fn transport_error(&self, error: reqwest::Error) -> LedgerError {
        if error.is_timeout() {
            LedgerError::Timeout(self.timeout_seconds)
        } else {
            LedgerError::Unavailable(error.to_string())
        }
    }

    async fn shortcodes(&self, tab: Option<&str>) -> Result<Vec<String>, LedgerError> {
        let mut params = vec![("action", "shortcodes")];
        if let Some(tab) = tab {
            params.push(("tab", tab));
        }
        let response: ShortcodesResponse = self.get(&params).await?;
        if response.ok == Some(false) {
            return Err(LedgerError::Unavailable(
                response
                    .error
                    .unwrap_or_else(|| "identifier listing failed".to_string()),
            ));
        }
        Ok(response.shortcodes)
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    fn name(&self) -> &str {
        "remote"
    }

    #[instrument(skip(self))]
    async fn health(&self) -> Result<HealthReport, LedgerError> {
        let response: TestResponse = self.get(&[("action", "test")]).await?;
        if !response.ok {
            return Err(LedgerError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "unknown error from ledger endpoint".to_string()),
            ));
        }
        Ok(HealthReport {
            count: response.count,
            counts: response.counts,
        })
    }

    #[instrument(skip(self))]
    async fn identifiers(&self) -> Result<Vec<PartitionSnapshot>, LedgerError> {
        if self.partitions.is_empty() {
            let identifiers = self.shortcodes(None).await?;
            debug!(count = identifiers.len(), "Loaded remote identifiers");
            return Ok(vec![PartitionSnapshot {
                partition: None,
                identifiers,
            }]);
        }

        let mut snapshots = Vec::with_capacity(self.partitions.len());
        for partition in &self.partitions {
            let identifiers = self.shortcodes(Some(partition)).await?;
            debug!(partition = %partition, count = identifiers.len(), "Loaded remote identifiers");
            snapshots.push(PartitionSnapshot {
                partition: Some(partition.clone()),
                identifiers,
            });
        }
        Ok(snapshots)
    }

    #[instrument(skip(self, headers, rows), fields(rows = rows.len()))]
    async fn append(
        &self,
        partition: &str,
        headers: &[String],
        rows: &[LogRow],
    ) -> Result<usize, LedgerError> {
        let url = self.request_url(&[])?;
        let response = self
            .client
            .post(url)
            .json(&AppendRequest {
                headers,
                rows,
                tab: partition,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let result: AppendResponse = self.read_body(response).await?;
        if !result.ok {
            return Err(LedgerError::Rejected(
                result.error.unwrap_or_else(|| "unknown".to_string()),
            ));
        }
        Ok(result.added.unwrap_or(rows.len()))
    }
}

/// Decode a JSON body, recognising HTML error pages
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, LedgerError> {
    serde_json::from_str(body).map_err(|e| {
        if body.to_ascii_lowercase().contains("<html") {
            LedgerError::InvalidResponse(HTML_MISCONFIGURED.to_string())
        } else {
            LedgerError::InvalidResponse(format!("invalid JSON: {}", e))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(credential: Option<&str>) -> HttpLedger {
        HttpLedger::new(
            "https://script.example.com/macros/s/abc/exec",
            credential.map(str::to_string),
            vec![],
            30,
        )
        .unwrap()
    }

    #[test]
    fn test_request_url_carries_credential() {
        let url = ledger(Some("s3cret"))
            .request_url(&[("action", "shortcodes"), ("tab", "P&V Manual Backup")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://script.example.com/macros/s/abc/exec?action=shortcodes&tab=P%26V+Manual+Backup&key=s3cret"
        );
    }

    #[test]
    fn test_debug_hides_credential() {
        let text = format!("{:?}", ledger(Some("s3cret")));
        assert!(text.contains("script.example.com"));
        assert!(text.contains("***"));
        assert!(!text.contains("s3cret"));
    }

    #[test]
    fn test_request_url_without_credential() {
        let url = ledger(Some("   ")).request_url(&[("action", "test")]).unwrap();
        assert_eq!(url.query(), Some("action=test"));
    }

    #[test]
    fn test_html_body_reported_as_misconfiguration() {
        let err = parse_body::<TestResponse>("<!DOCTYPE html><HTML><body>Sign in</body></HTML>")
            .unwrap_err();
        match err {
            LedgerError::InvalidResponse(msg) => assert!(msg.contains("HTML page")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_responses() {
        let test: TestResponse =
            parse_body(r#"{"ok": true, "count": 3, "counts": {"Stories": 3}}"#).unwrap();
        assert!(test.ok);
        assert_eq!(test.counts.get("Stories"), Some(&3));

        let codes: ShortcodesResponse = parse_body(r#"{"shortcodes": ["a", "b"]}"#).unwrap();
        assert_eq!(codes.shortcodes, vec!["a", "b"]);
        assert_eq!(codes.ok, None);

        let append: AppendResponse = parse_body(r#"{"ok": false, "error": "no such tab"}"#).unwrap();
        assert!(!append.ok);
        assert_eq!(append.error.as_deref(), Some("no such tab"));
    }

    #[test]
    fn test_append_request_shape() {
        let headers = vec!["Timestamp".to_string()];
        let rows: Vec<LogRow> = vec![];
        let body = serde_json::to_value(AppendRequest {
            headers: &headers,
            rows: &rows,
            tab: "Stories",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"headers": ["Timestamp"], "rows": [], "tab": "Stories"})
        );
    }
}
