//! Attachment retrieval
//!
//! An attachment reference is either an `http(s)` URL, a `file://` URL or a plain
//! filesystem path (for example an artifact written by an earlier batch).

use crate::error::MailError;
use crate::utils::reference_basename;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Filename used when a reference has no usable basename
pub const FALLBACK_NAME: &str = "attachment";

/// Retrieves an attachment into a local directory
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Fetch `reference` into `dest_dir`, returning the local file path
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Fetch`] for unreachable resources and non-2xx
    /// responses, and [`MailError::FetchTimeout`] when the time budget elapses.
    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf, MailError>;
}

/// Local filename for a reference
pub fn attachment_name(reference: &str) -> String {
    reference_basename(reference).unwrap_or_else(|| FALLBACK_NAME.to_string())
}

/// Fetches over HTTP(S) with a bounded timeout, and reads local references from disk
#[derive(Debug, Clone)]
pub struct HttpAttachmentFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpAttachmentFetcher {
    /// Create a fetcher with the given per-request time budget
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn fetch_http(&self, url: &str, dest: &Path) -> Result<(), MailError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        if !response.status().is_success() {
            return Err(MailError::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| self.request_error(url, e))?;

        tokio::fs::write(dest, &content)
            .await
            .map_err(|e| MailError::Fetch {
                url: url.to_string(),
                reason: format!("failed to store download: {e}"),
            })?;
        debug!(url, bytes = content.len(), "downloaded attachment");
        Ok(())
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> MailError {
        if e.is_timeout() {
            MailError::FetchTimeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            MailError::Fetch {
                url: url.to_string(),
                reason: format!("connection failed: {e}"),
            }
        } else {
            MailError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl Default for HttpAttachmentFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn local_source(reference: &str) -> Option<PathBuf> {
    match url::Url::parse(reference) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(url) if url.scheme().len() > 1 => None,
        _ => Some(PathBuf::from(reference)),
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf, MailError> {
        let reference = reference.trim();
        let dest = dest_dir.join(attachment_name(reference));
        let lower = reference.to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            self.fetch_http(reference, &dest).await?;
            return Ok(dest);
        }

        let source = local_source(reference).ok_or_else(|| MailError::Fetch {
            url: reference.to_string(),
            reason: "unsupported reference scheme".to_string(),
        })?;
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| MailError::Fetch {
                url: reference.to_string(),
                reason: e.to_string(),
            })?;
        debug!(source = ?source, "copied local attachment");
        Ok(dest)
    }
}
