use std::fmt;

use serde::de::DeserializeOwned;
use tokio::time::sleep;
use url::Url;

use crate::{
    request::build_request,
    response::interpret,
    BodyDecoder, ConfigOptions, JsonDecoder, LookupArg, LookupOutcome, ReqwestTransport, Result,
    RetryConfig, Transport,
};

/// Endpoint, lookup key names and retry policy for one lookup source.
#[derive(Clone, Debug)]
pub struct LookupConfig {
    url: String,
    arguments: Vec<String>,
    retry: RetryConfig,
}

impl LookupConfig {
    pub fn builder() -> LookupConfigBuilder {
        LookupConfigBuilder::default()
    }

    /// Builds the config with a retry policy read from `options`.
    pub fn from_options<I, S>(
        url: impl Into<String>,
        arguments: I,
        options: &ConfigOptions,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::builder()
            .url(url)
            .arguments(arguments)
            .retry(RetryConfig::create(options)?)
            .build())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

#[derive(Clone, Debug, Default)]
pub struct LookupConfigBuilder {
    url: String,
    arguments: Vec<String>,
    retry: RetryConfig,
}

impl LookupConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Lookup key names, in the order they appear in the query string.
    pub fn arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> LookupConfig {
        LookupConfig {
            url: self.url,
            arguments: self.arguments,
            retry: self.retry,
        }
    }
}

/// Polls a REST endpoint for a single enrichment row per lookup call.
///
/// The client holds no mutable state, so one instance can serve many
/// concurrent lookups.
#[derive(Clone)]
pub struct RestLookupClient<T = ReqwestTransport, D = JsonDecoder> {
    base_url: Url,
    arguments: Vec<String>,
    retry: RetryConfig,
    transport: T,
    decoder: D,
}

impl<T, D> fmt::Debug for RestLookupClient<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestLookupClient")
            .field("base_url", &self.base_url.as_str())
            .field("arguments", &self.arguments)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<R: DeserializeOwned> RestLookupClient<ReqwestTransport, JsonDecoder<R>> {
    /// Creates a reqwest-backed client decoding JSON rows.
    ///
    /// Reads the retry policy and `request.timeout` from `options`.
    pub fn from_options<I, S>(
        url: impl Into<String>,
        arguments: I,
        options: &ConfigOptions,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = LookupConfig::from_options(url, arguments, options)?;
        let transport = ReqwestTransport::from_options(options)?;
        Self::new(config, transport, JsonDecoder::new())
    }
}

impl<T, D> RestLookupClient<T, D>
where
    T: Transport,
    D: BodyDecoder,
{
    /// Creates a client, failing fast when the base URL is invalid.
    pub fn new(config: LookupConfig, transport: T, decoder: D) -> Result<Self> {
        let base_url = Url::parse(&config.url)?;
        Ok(Self {
            base_url,
            arguments: config.arguments,
            retry: config.retry,
            transport,
            decoder,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Looks up one row.
    ///
    /// Returns `None` for missing arguments, non-200 responses, undecodable
    /// bodies and exhausted retries alike.
    pub async fn pull(&self, args: &[LookupArg]) -> Option<D::Row> {
        self.lookup(args).await.into_option()
    }

    /// Looks up one row, keeping the reason for absence.
    ///
    /// Missing arguments yield [`LookupOutcome::NotFound`] without sending a
    /// request. Transport failures are retried up to the attempt budget;
    /// non-200 responses and decode errors are final.
    pub async fn lookup(&self, args: &[LookupArg]) -> LookupOutcome<D::Row> {
        let Some(request) = build_request(&self.base_url, &self.arguments, args) else {
            #[cfg(feature = "tracing")]
            tracing::debug!("lookup skipped, missing arguments for {}", self.base_url);
            return LookupOutcome::NotFound;
        };

        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1u32;
        loop {
            match self.transport.send(&request).await {
                Ok(response) => {
                    let outcome = interpret(&self.decoder, response.status, &response.body);

                    #[cfg(feature = "tracing")]
                    log_outcome(&request, response.status, &outcome);

                    return outcome;
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.interval().apply(attempt);

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "lookup attempt {}/{} failed: {}; retrying after {} ms",
                        attempt,
                        max_attempts,
                        err,
                        delay.as_millis()
                    );
                    #[cfg(not(feature = "tracing"))]
                    let _ = err;

                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        "lookup {} gave up after {} attempt(s): {}",
                        request.url(),
                        attempt,
                        err
                    );
                    return LookupOutcome::Error(err);
                }
            }
        }
    }
}

#[cfg(feature = "tracing")]
fn log_outcome<R>(request: &crate::LookupRequest, status: u16, outcome: &LookupOutcome<R>) {
    match outcome {
        LookupOutcome::NotFound => {
            tracing::debug!("lookup {} returned status {}, no row", request.url(), status)
        }
        LookupOutcome::Error(err) => {
            tracing::warn!("lookup {} failed to decode: {}", request.url(), err)
        }
        LookupOutcome::Found(_) => {}
    }
}
