use std::time::Duration;
use thiserror::Error;

/// Classification for URI validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidUriKind {
    /// URI could not be parsed at all
    ParseError,
    /// URI is missing the scheme component
    MissingScheme,
    /// URI is missing the host/authority component
    MissingAuthority,
    /// Reference resolution against the base produced an invalid result
    ResolveError,
}

impl std::fmt::Display for InvalidUriKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseError => write!(f, "parse error"),
            Self::MissingScheme => write!(f, "missing scheme"),
            Self::MissingAuthority => write!(f, "missing authority"),
            Self::ResolveError => write!(f, "resolve error"),
        }
    }
}

/// Errors produced by the HTTP client, resolvers and decoders
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HttpError {
    /// Client or resolver configuration is invalid
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A URI failed parsing or resolution
    #[error("invalid URI '{url}' ({kind}): {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// URI scheme is not usable under the configured transport security
    #[error("invalid scheme '{scheme}': {reason}")]
    InvalidScheme { scheme: String, reason: String },

    /// The resolver requires a request path and none was given
    #[error("{0} requires a request path")]
    PathRequired(&'static str),

    /// Server answered with an error status and no decodable body
    #[error("HTTP status {status}: {reason}")]
    Status {
        status: http::StatusCode,
        reason: String,
    },

    /// No decoder registered for the requested result type
    #[error("no decoder registered for '{type_name}'")]
    NoDecoder { type_name: &'static str },

    /// Request construction failed
    #[error("failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Header name was rejected by the http crate
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Header value was rejected by the http crate
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Request did not complete within the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or protocol failure below the HTTP layer
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS configuration or handshake setup failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Response body exceeded the configured size limit
    #[error("response body too large: limit {limit} bytes, got at least {actual}")]
    BodyTooLarge { limit: usize, actual: usize },

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form body encoding failure
    #[error("form encoding error: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// The in-flight request buffer is full
    #[error("client overloaded: request buffer is full")]
    Overloaded,

    /// The background service worker has shut down
    #[error("client service closed")]
    ServiceClosed,
}

impl HttpError {
    /// Shorthand for [`HttpError::InvalidConfig`]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Build a [`HttpError::Status`] with the canonical reason phrase
    #[must_use]
    pub fn status(status: http::StatusCode) -> Self {
        Self::Status {
            status,
            reason: status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_owned(),
        }
    }

    /// True when retrying the request could plausibly succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}
