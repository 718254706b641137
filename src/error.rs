//! Unified error handling for the escargot crate
//!
//! Domain errors live next to the code that raises them and are wrapped by the
//! crate-wide [`Error`]:
//!
//! - [`QueueError`] - storage and job id failures of a [`crate::queue::Queue`]
//! - [`TransportError`] - connection level failures of one exchange
//! - [`HttpError`] - final status codes of 300 and above
//! - [`UriError`] - malformed URIs and invalid tags
//!
//! Transport and HTTP errors are routed to subscribers by the scheduler and
//! never abort a crawl. Everything else propagates to the caller.
//!
//! # Usage
//!
//! ```rust,ignore
//! use escargot::error::{Error, ErrorCategory, EscargotErrorTrait};
//!
//! fn report(err: &Error) {
//!     if err.category() == ErrorCategory::Contract {
//!         eprintln!("Subscriber bug: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::queue::error::QueueError;
pub use crate::utils::error::{HttpError, TransportError, UriError};

/// Common trait for all escargot error types
pub trait EscargotErrorTrait: std::error::Error {
    /// Check if retrying the same operation later could succeed
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport failures and HTTP status errors
    Network,
    /// Queue storage errors
    Storage,
    /// Misuse of the API by a caller or subscriber
    Contract,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

/// Unified error type for the escargot crate
#[derive(Error, Debug)]
pub enum Error {
    /// Queue storage errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Transport failures of a single exchange
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// HTTP status failures of a single exchange
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// URI parsing and tagging errors
    #[error("URI error: {0}")]
    Uri(#[from] UriError),

    /// A URI was added below a page that already sits at the maximum depth
    #[error("Cannot add URI \"{uri}\" found on level {level}: maximum depth of {max_depth} reached")]
    MaxDepthReached {
        uri: String,
        level: u32,
        max_depth: u32,
    },

    /// The job id is unknown to the queue
    #[error("Job ID \"{0}\" is invalid")]
    InvalidJobId(String),

    /// A new job needs at least one base URI
    #[error("Cannot create a crawl job without base URIs")]
    EmptyBaseUris,

    /// The user agent belongs to the default transport and cannot be changed
    /// once a custom transport was installed
    #[error("Cannot override the user agent on a custom transport")]
    ClientAlreadyCustomized,

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl EscargotErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Queue(e) => e.is_recoverable(),
            Self::Transport(_) => true,
            Self::Http(e) => e.status().is_some_and(|s| s.is_server_error()),
            Self::Uri(_)
            | Self::MaxDepthReached { .. }
            | Self::InvalidJobId(_)
            | Self::EmptyBaseUris
            | Self::ClientAlreadyCustomized
            | Self::Config(_)
            | Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Queue(QueueError::InvalidJobId(_)) => ErrorCategory::Contract,
            Self::Queue(_) => ErrorCategory::Storage,
            Self::Transport(_) | Self::Http(_) => ErrorCategory::Network,
            Self::Uri(_)
            | Self::MaxDepthReached { .. }
            | Self::InvalidJobId(_)
            | Self::EmptyBaseUris
            | Self::ClientAlreadyCustomized => ErrorCategory::Contract,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the scheduler routes this error to exception subscribers
    /// instead of aborting the crawl
    pub fn is_exchange_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
