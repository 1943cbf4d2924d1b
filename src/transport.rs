use std::future::Future;
use std::time::Duration;

use crate::options::{ConfigOptions, REQUEST_TIMEOUT};
use crate::{LookupRequest, Result};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Status code and full body of one HTTP response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Executes lookup requests.
///
/// Any error returned here is treated as transient and fed to the retry loop.
pub trait Transport {
    fn send(&self, request: &LookupRequest) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Reuses an existing client and its connection pool.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Reads `request.timeout` (default 30s).
    pub fn from_options(options: &ConfigOptions) -> Result<Self> {
        let transport = Self::new();
        Ok(match options.get_duration(REQUEST_TIMEOUT)? {
            Some(timeout) => transport.with_timeout(timeout),
            None => transport,
        })
    }

    /// Per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &LookupRequest) -> Result<RawResponse> {
        let response = self
            .http
            .get(request.url().clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RawResponse::new(status, body.to_vec()))
    }
}
