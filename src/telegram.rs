//! File download over the Telegram Bot API.
//!
//! Uploaded language files arrive as Telegram documents. Fetching one is two
//! calls: `getFile` turns the document's `file_id` into a server-side path,
//! then `file/bot<token>/<file_path>` serves the bytes.

use crate::config::Config;
use crate::retry::{with_retry_if, RetryConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Telegram API error ({status}): {description}")]
    Api { status: u16, description: String },

    #[error("Failed to send request to Telegram API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from Telegram API: {0}")]
    UnexpectedResponse(String),

    #[error("Failed to write downloaded file to '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Transport failures, 5xx and rate limiting may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Api { status, .. } => *status >= 500 || *status == 429,
            FetchError::UnexpectedResponse(_) | FetchError::Io { .. } => false,
        }
    }
}

/// Retrieves a remote file by opaque handle into a local path.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, handle: &str, destination: &Path) -> Result<(), FetchError>;
}

// Bot API envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    #[allow(dead_code)]
    file_id: String,
    file_path: Option<String>,
}

/// [`FileFetcher`] backed by the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramFileFetcher {
    bot_token: String,
    api_url: String,
    client: reqwest::Client,
    api_retry: RetryConfig,
    download_retry: RetryConfig,
}

impl TelegramFileFetcher {
    pub fn new(bot_token: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            api_retry: RetryConfig::api_call(),
            download_retry: RetryConfig::file_download(),
        }
    }

    /// `None` when no bot token is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .telegram_bot_token
            .as_ref()
            .map(|token| Self::new(token.clone(), config.telegram_api_url.clone()))
    }

    pub fn with_retry(mut self, api_retry: RetryConfig, download_retry: RetryConfig) -> Self {
        self.api_retry = api_retry;
        self.download_retry = download_retry;
        self
    }

    async fn get_file_path(&self, handle: &str) -> Result<String, FetchError> {
        let url = format!("{}/bot{}/getFile", self.api_url, self.bot_token);

        let response = self
            .client
            .get(&url)
            .query(&[("file_id", handle)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: ApiResponse<TelegramFile> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(FetchError::Api {
                    status: status.as_u16(),
                    description: body,
                })
            }
            Err(e) => return Err(FetchError::UnexpectedResponse(e.to_string())),
        };

        if !parsed.ok || !status.is_success() {
            return Err(FetchError::Api {
                status: parsed.error_code.unwrap_or_else(|| status.as_u16()),
                description: parsed.description.unwrap_or_default(),
            });
        }

        parsed
            .result
            .and_then(|file| file.file_path)
            .ok_or_else(|| FetchError::UnexpectedResponse("getFile returned no file_path".to_string()))
    }

    async fn download(&self, file_path: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/file/bot{}/{}", self.api_url, self.bot_token, file_path);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                description: body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl FileFetcher for TelegramFileFetcher {
    async fn fetch(&self, handle: &str, destination: &Path) -> Result<(), FetchError> {
        let file_path = with_retry_if(
            &self.api_retry,
            "Telegram getFile",
            || self.get_file_path(handle),
            FetchError::is_retryable,
        )
        .await?;
        debug!("Resolved Telegram file {} to {}", handle, file_path);

        let bytes = with_retry_if(
            &self.download_retry,
            "Telegram file download",
            || self.download(&file_path),
            FetchError::is_retryable,
        )
        .await?;

        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;

        info!(
            "Downloaded Telegram file {} ({} bytes) to {}",
            handle,
            bytes.len(),
            destination.display()
        );
        Ok(())
    }
}
