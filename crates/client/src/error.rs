//! Error types for the registry client.

use std::time::Duration;
use thiserror::Error;

use crate::endpoint::AddressFamily;

/// Result type for registrar operations.
pub type Result<T> = std::result::Result<T, RegistrarError>;

/// Failures talking to the registry over HTTP.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The registry answered with a status other than the one the operation expects.
    #[error("{method} {url} returned {actual}, expected {expected}")]
    Status {
        method: &'static str,
        url: String,
        expected: u16,
        actual: u16,
    },

    /// The request did not complete within its time bound.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or protocol level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not match the registry contract.
    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("invalid registry URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl TransportError {
    /// True for the timeout specialization.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors surfaced by [`Registrar`](crate::Registrar) and [`Resolver`](crate::Resolver).
#[derive(Debug, Error)]
pub enum RegistrarError {
    /// A required registration field was not supplied.
    #[error("missing or invalid required field `{0}`")]
    InvalidArgument(&'static str),

    #[error("service instance is already registered")]
    AlreadyRegistered,

    /// The client was deregistered and cannot register again.
    #[error("service instance was deregistered; create a new client to register again")]
    AlreadyDeregistered,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no instances registered for service `{0}`")]
    ServiceNotFound(String),

    #[error("selected instance of `{service}` has no {family} address")]
    NoAddressForFamily {
        service: String,
        family: AddressFamily,
    },
}

impl RegistrarError {
    /// True when the underlying transport call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}
