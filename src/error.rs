/// Boxed error carried by [`LookupError::Transport`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// Missing or malformed configuration value.
    #[error("config error: {0}")]
    Config(String),
    /// Base URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Network, connection or timeout failure for a single attempt.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// Response body could not be decoded into a row.
    #[error("decode error: {0}")]
    Decode(String),
}

impl LookupError {
    /// Wraps any transport-level failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Whether the retry loop may try the request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}
