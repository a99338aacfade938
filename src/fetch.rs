//! Fetching a JWKS (or, for ALB, a single PEM key) over HTTP.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Fetches the raw bytes at a URI. Implementations decide what counts as
/// retryable vs terminal — the default implementation treats network
/// errors and 5xx as retryable and 4xx as terminal.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Fetch the bytes at `uri`.
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError>;
}

/// The default [`JwksFetcher`], backed by `reqwest` with the `rustls` TLS
/// backend.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestFetcher {
    /// A fetcher using a client configured with this crate's default
    /// timeouts.
    pub fn new() -> Self {
        Self::with_client(default_client())
    }

    /// A fetcher using a caller-supplied client, e.g. for custom proxy or
    /// TLS settings.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl JwksFetcher for ReqwestFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .client
            .get(uri)
            .header("accept", "application/json, application/x-pem-file, */*")
            .send()
            .await
            .map_err(|e| FetchError::Retryable(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            resp.bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| FetchError::Retryable(e.to_string()))
        } else if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            Err(FetchError::NonRetryable { status: status.as_u16(), body })
        } else {
            Err(FetchError::Retryable(format!("unexpected status {status}")))
        }
    }
}
