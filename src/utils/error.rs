//! Error types for URIs and HTTP exchanges
//!
//! These are the errors a single exchange can raise. Transport and HTTP status
//! failures are routed to subscribers instead of aborting a crawl.

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Errors raised while parsing, validating or tagging URIs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// The string could not be parsed as a URI
    #[error("Invalid URI \"{uri}\": {reason}")]
    Invalid { uri: String, reason: String },

    /// The URI is valid but not an http(s) URI
    #[error("Invalid HTTP URI: {0}")]
    NotHttp(String),

    /// Tags are persisted comma-joined, so they must not contain commas
    #[error("Cannot use commas in tags: \"{0}\"")]
    InvalidTag(String),
}

/// Transport-level failures (connection, DNS, timeout, aborted streams)
#[derive(Error, Debug)]
pub enum TransportError {
    /// Error reported by the HTTP client
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Connection could not be established
    #[error("Connection to \"{url}\" failed: {reason}")]
    Connection { url: String, reason: String },

    /// Request timed out
    #[error("Request to \"{url}\" timed out")]
    Timeout { url: String },

    /// Response stream ended before the response head arrived
    #[error("Response stream for \"{url}\" ended before headers were received")]
    Incomplete { url: String },
}

impl TransportError {
    /// Create a connection error
    pub fn connection(url: &Url, reason: impl Into<String>) -> Self {
        Self::Connection {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// HTTP status failures, raised once the response headers are materialized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Final status code was a redirection, client or server error
    #[error("HTTP {status} returned for \"{url}\"")]
    Status { url: Url, status: StatusCode },

    /// Headers were asked for before the transport delivered any
    #[error("No response received for \"{url}\"")]
    NoResponse { url: Url },
}

impl HttpError {
    /// The status code that triggered the error
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::NoResponse { .. } => None,
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            Self::Status { url, .. } | Self::NoResponse { url } => url,
        }
    }
}
