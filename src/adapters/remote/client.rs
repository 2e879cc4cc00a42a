//! Contents HTTP Client - Retrying REST Client for the Remote Ledger
//!
//! Wraps reqwest with a finite timeout, bearer auth and exponential
//! backoff on transient failures (network errors, 429, 5xx). Status
//! codes with a meaning for the ledger (404 missing, 409/412/422 stale
//! sha) are mapped straight to `StoreError` without retrying.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::types::{ContentsResponse, PutContentsRequest, PutContentsResponse};
use crate::config::RemoteStorageConfig;
use crate::ports::store::StoreError;

/// Configuration for the contents client.
#[derive(Debug, Clone)]
pub struct ContentsClientConfig {
  /// API base URL, without trailing slash.
  pub api_url: String,
  /// Repository owner.
  pub owner: String,
  /// Repository name.
  pub repo: String,
  /// File path inside the repository.
  pub path: String,
  /// Branch to read and write.
  pub branch: String,
  /// Commit message for writes.
  pub commit_message: String,
  /// API token, if any.
  pub token: Option<String>,
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
}

impl ContentsClientConfig {
  /// Build from config, reading the token from the configured env var.
  ///
  /// A missing token is allowed (public repositories are readable
  /// without one); writes will then fail with an auth error.
  pub fn from_settings(settings: &RemoteStorageConfig) -> Self {
    let token = std::env::var(&settings.token_env).ok().filter(|t| !t.is_empty());
    if token.is_none() {
      warn!(env = %settings.token_env, "No remote store token set, writes will be rejected");
    }

    Self {
      api_url: settings.api_url.trim_end_matches('/').to_string(),
      owner: settings.owner.clone(),
      repo: settings.repo.clone(),
      path: settings.path.trim_start_matches('/').to_string(),
      branch: settings.branch.clone(),
      commit_message: settings.commit_message.clone(),
      token,
      timeout: Duration::from_millis(settings.timeout_ms),
      max_retries: settings.max_retries,
      retry_base_delay: Duration::from_millis(250),
    }
  }
}

/// A file read from the remote repository.
#[derive(Debug, Clone)]
pub struct RemoteFile {
  /// Decoded UTF-8 body.
  pub body: String,
  /// Blob sha.
  pub sha: String,
}

/// HTTP client for a single file of the contents API.
pub struct ContentsClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: ContentsClientConfig,
}

impl ContentsClient {
  /// Create a new contents client.
  pub fn new(config: ContentsClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .user_agent(concat!("trade-journal/", env!("CARGO_PKG_VERSION")))
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self { http, config })
  }

  /// URL of the ledger file resource.
  pub fn file_url(&self) -> String {
    format!(
      "{}/repos/{}/{}/contents/{}",
      self.config.api_url, self.config.owner, self.config.repo, self.config.path
    )
  }

  /// Fetch the file body and its sha.
  pub async fn get_file(&self) -> Result<RemoteFile, StoreError> {
    let request = self
      .http
      .get(self.file_url())
      .query(&[("ref", self.config.branch.as_str())])
      .header("Accept", "application/vnd.github+json");

    let response = self.execute_with_retry(request, "GET").await?;
    let body: ContentsResponse = response
      .json()
      .await
      .map_err(|e| StoreError::Backend(format!("invalid contents response: {e}")))?;

    if body.encoding.as_deref().is_some_and(|enc| enc != "base64") {
      return Err(StoreError::Malformed(format!(
        "remote file is served with encoding {:?}, expected base64",
        body.encoding
      )));
    }

    Ok(RemoteFile {
      body: decode_content(&body.content)?,
      sha: body.sha,
    })
  }

  /// Overwrite the file. `sha` must be the blob being replaced, or
  /// `None` when creating it.
  pub async fn put_file(&self, body: &str, sha: Option<&str>) -> Result<String, StoreError> {
    let payload = PutContentsRequest {
      message: &self.config.commit_message,
      content: STANDARD.encode(body.as_bytes()),
      sha,
      branch: &self.config.branch,
    };

    let request = self
      .http
      .put(self.file_url())
      .header("Accept", "application/vnd.github+json")
      .json(&payload);

    let response = self.execute_with_retry(request, "PUT").await?;
    let written: PutContentsResponse = response
      .json()
      .await
      .map_err(|e| StoreError::Backend(format!("invalid write response: {e}")))?;

    Ok(written.content.sha)
  }

  /// Execute request with authentication and retries.
  async fn execute_with_retry(
    &self,
    request: RequestBuilder,
    method: &str,
  ) -> Result<Response, StoreError> {
    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis(), method, "Retrying request");
        sleep(delay).await;
      }

      let mut req = request
        .try_clone()
        .ok_or_else(|| StoreError::Backend("request body is not cloneable".to_string()))?;

      if let Some(token) = &self.config.token {
        req = req.bearer_auth(token);
      }

      match req.send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => return Ok(response),
          StatusCode::NOT_FOUND => {
            return Err(StoreError::NotFound(self.file_url()));
          }
          StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED | StatusCode::UNPROCESSABLE_ENTITY => {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Conflict(format!("{method} rejected: {body}")));
          }
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(method, "Rate limited by contents API, backing off");
            last_error = Some(StoreError::Backend("rate limited".to_string()));
          }
          status if status.is_server_error() => {
            warn!(status = %status, method, "Server error, retrying");
            last_error = Some(StoreError::Backend(format!("server error: {status}")));
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("API error {status}: {body}")));
          }
        },
        Err(e) => {
          warn!(error = %e, attempt, method, "Request failed");
          last_error = Some(StoreError::Backend(e.to_string()));
        }
      }
    }

    Err(last_error.unwrap_or_else(|| StoreError::Backend("max retries exceeded".to_string())))
  }
}

/// Decode a base64 contents body (line breaks allowed) into UTF-8.
pub fn decode_content(encoded: &str) -> Result<String, StoreError> {
  let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
  let bytes = STANDARD
    .decode(compact)
    .map_err(|e| StoreError::Malformed(format!("invalid base64 content: {e}")))?;
  String::from_utf8(bytes).map_err(|e| StoreError::Malformed(format!("content is not UTF-8: {e}")))
}
