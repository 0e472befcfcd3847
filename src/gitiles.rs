//! Gitiles REST client
//!
//! A client is bound to one host and exposes the three narrow capabilities
//! the engines need: fetch a file at a ref, page through a commit log, and
//! list refs. All responses use the Gitiles JSON wire format with its XSSI
//! guard prefix; file contents arrive base64 encoded.

use crate::commit::RawCommit;
use crate::{BuildLogError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Per-request timeout for file and ref fetches
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-request timeout for log pages (large page sizes return slowly)
const LOG_TIMEOUT: Duration = Duration::from_secs(60);

/// Gitiles prepends this to JSON bodies to defeat cross-site inclusion
const XSSI_PREFIX: &str = ")]}'";

/// One page of a commit log, newest first
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogPage {
    #[serde(default)]
    pub log: Vec<RawCommit>,
    /// Continuation token; absent on the final page
    #[serde(default, rename = "next")]
    pub next_page_token: Option<String>,
}

/// Narrow view of a git host used by the changelog and find-build engines.
///
/// Implementations are bound to a single host URL and are safe for
/// concurrent use. The production implementation is [`GitilesClient`];
/// tests substitute an in-memory host.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Fetch a file at a given committish, decoded to UTF-8
    async fn fetch_file(&self, repo: &str, committish: &str, path: &str) -> Result<String>;

    /// One page of commits reachable from `committish` but not from
    /// `exclude_ancestors_of` (no lower bound when `None`)
    async fn log_page(
        &self,
        repo: &str,
        committish: &str,
        exclude_ancestors_of: Option<&str>,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<LogPage>;

    /// All refs under `refs_path` (e.g. "refs/tags"), keyed by full ref
    /// name, mapped to the commit SHA they point at
    async fn refs(&self, repo: &str, refs_path: &str) -> Result<HashMap<String, String>>;
}

/// REST client for one Gitiles host
pub struct GitilesClient {
    /// Host without scheme, e.g. "cos.googlesource.com"
    host: String,
    client: Client,
}

impl GitilesClient {
    /// Create a client bound to `host` (scheme optional)
    pub fn new(host: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static("buildlog/0.1"),
                );
                headers
            })
            .build()?;

        let host = host
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() {
            return Err(BuildLogError::Config("empty Gitiles host".to_string()));
        }

        Ok(Self { host, client })
    }

    /// The host this client is bound to, scheme stripped
    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}/{}", self.host, path)
    }

    async fn get_json_body(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                Ok(strip_xssi_prefix(&body).to_string())
            }
            StatusCode::NOT_FOUND => Err(BuildLogError::NotFound(url.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BuildLogError::Transport(format!(
                    "{}: HTTP {}: {}",
                    self.host, status, body
                )))
            }
        }
    }
}

#[async_trait]
impl GitClient for GitilesClient {
    async fn fetch_file(&self, repo: &str, committish: &str, path: &str) -> Result<String> {
        let url = self.url(&format!("{}/+/{}/{}?format=TEXT", repo, committish, path));
        tracing::debug!(host = %self.host, repo = %repo, committish = %committish, path = %path, "Fetching file");

        let response = self.client.get(&url).timeout(FETCH_TIMEOUT).send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let decoded = BASE64.decode(body.trim()).map_err(|e| {
                    BuildLogError::Parse(format!("invalid base64 file body from {}: {}", url, e))
                })?;
                String::from_utf8(decoded).map_err(|e| {
                    BuildLogError::Parse(format!("file at {} is not UTF-8: {}", url, e))
                })
            }
            StatusCode::NOT_FOUND => Err(BuildLogError::NotFound(format!(
                "{}/{} at {}",
                repo, path, committish
            ))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BuildLogError::Transport(format!(
                    "{}: HTTP {}: {}",
                    self.host, status, body
                )))
            }
        }
    }

    async fn log_page(
        &self,
        repo: &str,
        committish: &str,
        exclude_ancestors_of: Option<&str>,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<LogPage> {
        let range = match exclude_ancestors_of {
            Some(ancestor) if !ancestor.is_empty() => format!("{}..{}", ancestor, committish),
            _ => committish.to_string(),
        };
        let mut url = self.url(&format!("{}/+log/{}?format=JSON&n={}", repo, range, page_size));
        if let Some(token) = page_token {
            url.push_str(&format!("&s={}", urlencoding::encode(token)));
        }
        tracing::debug!(host = %self.host, repo = %repo, range = %range, page_size, "Requesting log page");

        let body = self.get_json_body(&url, LOG_TIMEOUT).await?;
        serde_json::from_str(&body).map_err(|e| {
            BuildLogError::Parse(format!("invalid log response from {}: {}", self.host, e))
        })
    }

    async fn refs(&self, repo: &str, refs_path: &str) -> Result<HashMap<String, String>> {
        #[derive(Deserialize)]
        struct RefValue {
            value: String,
        }

        let url = self.url(&format!("{}/+{}?format=JSON", repo, refs_path));
        tracing::debug!(host = %self.host, repo = %repo, refs_path = %refs_path, "Listing refs");

        let body = self.get_json_body(&url, FETCH_TIMEOUT).await?;
        let raw: HashMap<String, RefValue> = serde_json::from_str(&body).map_err(|e| {
            BuildLogError::Parse(format!("invalid refs response from {}: {}", self.host, e))
        })?;
        Ok(raw
            .into_iter()
            .map(|(name, v)| {
                // Gitiles keys refs relative to the request path
                let full = if name.starts_with("refs/") {
                    name
                } else {
                    format!("{}/{}", refs_path, name)
                };
                (full, v.value)
            })
            .collect())
    }
}

fn strip_xssi_prefix(body: &str) -> &str {
    body.strip_prefix(XSSI_PREFIX)
        .map(|rest| rest.trim_start_matches(['\r', '\n']))
        .unwrap_or(body)
}
