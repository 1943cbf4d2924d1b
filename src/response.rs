use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::{LookupError, Result};

/// Turns a successful response body into a row.
pub trait BodyDecoder {
    type Row;

    fn decode(&self, body: &[u8]) -> Result<Self::Row>;
}

/// JSON body decoder backed by `serde_json`.
pub struct JsonDecoder<T = serde_json::Value> {
    _row: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self { _row: PhantomData }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("row", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: DeserializeOwned> BodyDecoder for JsonDecoder<T> {
    type Row = T;

    fn decode(&self, body: &[u8]) -> Result<T> {
        serde_json::from_slice(body).map_err(|err| {
            LookupError::Decode(format!(
                "invalid lookup response JSON: {err}; body: {}",
                String::from_utf8_lossy(body)
            ))
        })
    }
}

/// Result of interpreting one HTTP response.
#[derive(Debug)]
pub enum LookupOutcome<R> {
    Found(R),
    NotFound,
    Error(LookupError),
}

impl<R> LookupOutcome<R> {
    /// Collapses the outcome into "enrichment value or nothing".
    pub fn into_option(self) -> Option<R> {
        match self {
            Self::Found(row) => Some(row),
            Self::NotFound | Self::Error(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Maps a status code and body to an outcome.
///
/// Only `200` is decoded. Every other status, client or server error alike,
/// is absence of a result rather than a failure.
pub fn interpret<D: BodyDecoder>(decoder: &D, status: u16, body: &[u8]) -> LookupOutcome<D::Row> {
    if status != 200 {
        return LookupOutcome::NotFound;
    }
    match decoder.decode(body) {
        Ok(row) => LookupOutcome::Found(row),
        Err(err) => LookupOutcome::Error(err),
    }
}
