//! `http-lookup` enriches streaming records with rows fetched from a REST service.
//!
//! One lookup call builds a GET request from its key arguments, retries
//! transport failures under a deterministic [`RetryConfig`], and turns the
//! response into an optional row:
//! - [`RestLookupClient::pull`]
//! - [`RetryConfig::create`]
//!
//! Every per-call failure degrades to "no row"; only configuration errors
//! surface, and they do so at construction time.

mod client;
mod error;
pub mod options;
mod request;
mod response;
mod retry;
mod transport;

pub use client::{LookupConfig, LookupConfigBuilder, RestLookupClient};
pub use error::{BoxError, LookupError};
pub use options::ConfigOptions;
pub use request::{LookupArg, LookupRequest};
pub use response::{interpret, BodyDecoder, JsonDecoder, LookupOutcome};
pub use retry::{IntervalFunction, RetryConfig, RetryStrategy};
pub use transport::{RawResponse, ReqwestTransport, Transport};

pub type Result<T> = std::result::Result<T, LookupError>;
