use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Deserialize;

use crate::core::spamlist::{DenylistSource, SpamListError, UserId};

/// Placeholder for the user id in the check URL template.
pub const USER_ID_PLACEHOLDER: &str = "{user_id}";

/// Minimal CAS (Combot Anti-Spam) API client: the bulk CSV export and the
/// per-user check endpoint.
pub struct CasApiClient {
    client: Client,
    export_url: String,
    check_url: String,
}

/// Response of the check endpoint. Only `ok` matters; CAS also sends a
/// `result` or `description` we don't use.
#[derive(Debug, Deserialize)]
struct CheckResponse {
    ok: bool,
}

impl CasApiClient {
    pub fn new(
        export_url: impl Into<String>,
        check_url: impl Into<String>,
    ) -> Result<Self, SpamListError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("SpamBlockerBot/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| SpamListError::Request(e.to_string()))?;

        Ok(Self {
            client,
            export_url: export_url.into(),
            check_url: check_url.into(),
        })
    }

    fn check_url_for(&self, user_id: UserId) -> String {
        self.check_url
            .replace(USER_ID_PLACEHOLDER, &user_id.to_string())
    }

    /// Parse the first column of one export row as a user id.
    fn parse_row(line_no: usize, line: &str) -> Result<UserId, SpamListError> {
        let first = line.split(',').next().unwrap_or_default().trim();
        let first = first.trim_matches('"');
        first.parse::<UserId>().map_err(|e| SpamListError::MalformedRow {
            line: line_no,
            reason: format!("{:?}: {}", first, e),
        })
    }

    /// Parse the whole export, skipping rows that aren't a user id.
    ///
    /// A body that has content but no valid rows at all (an HTML error page, for
    /// instance) is rejected so the caller falls back to the local snapshot.
    pub fn parse_export(body: &str) -> Result<Vec<UserId>, SpamListError> {
        let mut ids = Vec::new();
        let mut skipped = 0usize;

        for (idx, line) in body.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_row(idx + 1, line) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(error = %e, "Skipping export row");
                }
            }
        }

        if ids.is_empty() && skipped > 0 {
            return Err(SpamListError::MalformedResponse(format!(
                "export has {} rows but no user ids",
                skipped
            )));
        }
        if skipped > 0 {
            tracing::info!(skipped, imported = ids.len(), "Skipped malformed export rows");
        }

        Ok(ids)
    }
}

#[async_trait]
impl DenylistSource for CasApiClient {
    async fn fetch_all(&self) -> Result<Vec<UserId>, SpamListError> {
        let resp = self
            .client
            .get(&self.export_url)
            .send()
            .await
            .map_err(|e| SpamListError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SpamListError::Request(format!(
                "CAS returned {} for the export",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SpamListError::Request(e.to_string()))?;
        Self::parse_export(&body)
    }

    async fn lookup_one(&self, user_id: UserId) -> Result<bool, SpamListError> {
        let resp = self
            .client
            .get(self.check_url_for(user_id))
            .send()
            .await
            .map_err(|e| SpamListError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SpamListError::Request(format!(
                "CAS returned {} for user {}",
                resp.status(),
                user_id
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SpamListError::Request(e.to_string()))?;
        let check: CheckResponse = serde_json::from_str(&body)
            .map_err(|e| SpamListError::MalformedResponse(e.to_string()))?;

        Ok(check.ok)
    }
}
