use std::borrow::Cow;

use bytes::Bytes;
use thiserror::Error;

use crate::adapter::{RestError, RestErrorKind};

pub type ClientResult<T> = Result<T, ClientError>;

/// Everything a `ResourceClient` call can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No complete response was received.
    #[error("transport failure: {0}")]
    Transport(#[from] RestError),

    /// A response arrived with a non-2xx status.
    #[error("unexpected http status {status}")]
    HttpStatus { status: u16, body: Bytes },

    /// The response body did not have the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("failed to encode request payload: {0}")]
    Encode(String),

    /// The sub-path would leave the configured base; nothing was sent.
    #[error("invalid sub-path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(err) if err.kind() == RestErrorKind::Timeout)
    }

    /// Raw error body of an `HttpStatus` failure, lossily decoded as UTF-8.
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::HttpStatus { body, .. } => Some(String::from_utf8_lossy(body)),
            _ => None,
        }
    }
}

/// Rejected `ClientConfig` input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("base url must not be empty")]
    EmptyBaseUrl,

    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),

    #[error("base url {0:?} is a path prefix; the transport needs an origin")]
    MissingOrigin(String),

    #[error("invalid {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },
}
