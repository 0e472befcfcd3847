//! Gerrit REST client
//!
//! Only the change-query endpoint is needed: find-build resolves a
//! user-supplied identifier (change number, commit SHA, or change
//! signature) to the submitted change it names.

use crate::{BuildLogError, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Per-request timeout for change queries
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Gerrit prepends this to JSON bodies to defeat cross-site inclusion
const XSSI_PREFIX: &str = ")]}'";

/// A change as returned by the Gerrit query endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeInfo {
    #[serde(rename = "_number")]
    pub number: u64,
    /// Repository the change was submitted to, unprefixed
    pub project: String,
    pub branch: String,
    /// SHA of the currently submitted patch set
    #[serde(default)]
    pub current_revision: Option<String>,
    /// Submission timestamp, "YYYY-MM-DD HH:MM:SS.nnnnnnnnn"; absent for
    /// open changes
    #[serde(default)]
    pub submitted: Option<String>,
}

/// Query seam for the code-review system
#[async_trait]
pub trait ChangeQuery: Send + Sync {
    /// Up to `limit` changes matching `query`, with current revision data
    async fn query_changes(&self, query: &str, limit: u32) -> Result<Vec<ChangeInfo>>;
}

/// REST client for one Gerrit host
pub struct GerritClient {
    /// Base URL including scheme, e.g. "https://cos-review.googlesource.com"
    base_url: String,
    client: Client,
}

impl GerritClient {
    /// Create a client bound to `host` (scheme optional, https assumed)
    pub fn new(host: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(QUERY_TIMEOUT)
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static("buildlog/0.1"),
                );
                headers
            })
            .build()?;

        let trimmed = host.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(BuildLogError::Config("empty Gerrit host".to_string()));
        }
        let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl ChangeQuery for GerritClient {
    async fn query_changes(&self, query: &str, limit: u32) -> Result<Vec<ChangeInfo>> {
        let url = format!(
            "{}/changes/?q={}&n={}&o=CURRENT_REVISION",
            self.base_url,
            urlencoding::encode(query),
            limit
        );
        tracing::debug!(query = %query, limit, "Querying Gerrit for changes");

        let response = self.client.get(&url).timeout(QUERY_TIMEOUT).send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let json = body
                    .strip_prefix(XSSI_PREFIX)
                    .map(|rest| rest.trim_start_matches(['\r', '\n']))
                    .unwrap_or(&body);
                serde_json::from_str(json).map_err(|e| {
                    BuildLogError::Parse(format!(
                        "invalid change query response from {}: {}",
                        self.base_url, e
                    ))
                })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BuildLogError::Transport(format!(
                    "{}: HTTP {}: {}",
                    self.base_url, status, body
                )))
            }
        }
    }
}
