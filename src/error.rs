use std::fmt;
use std::io;
use thiserror::Error;

/// Why an operation context stopped an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller cancelled the context
    Cancelled,
    /// The context deadline passed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// One failed bind inside a fan-out deployment
#[derive(Debug)]
pub struct BindFailure {
    /// 1-based position of the sub-resource in the fan-out order
    pub index: usize,
    /// Vendor identifier of the sub-resource
    pub resource: String,
    /// The underlying error
    pub error: Box<Error>,
}

/// Aggregated result of a fan-out that failed for some sub-resources
#[derive(Debug)]
pub struct PartialFailure {
    /// Sub-resources bound successfully
    pub succeeded: Vec<String>,
    /// Every failed sub-resource, in fan-out order
    pub failures: Vec<BindFailure>,
}

impl PartialFailure {
    /// Indices (1-based) of every failed sub-resource
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} sub-resources failed",
            self.failures.len(),
            self.failures.len() + self.succeeded.len()
        )?;
        for failure in &self.failures {
            write!(f, "; [{}] {}: {}", failure.index, failure.resource, failure.error)?;
        }
        if !self.succeeded.is_empty() {
            write!(f, "; succeeded: {}", self.succeeded.join(", "))?;
        }
        Ok(())
    }
}

/// Flat classification of [`Error`] for callers deciding what happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    ApiSemantic,
    AmbiguousResponse,
    Cancellation,
    PartialFailure,
    TaskFailed,
    MalformedCertificate,
    UnsupportedKey,
    UnsupportedProvider,
    Internal,
}

/// Generic error type
#[derive(Error, Debug)]
pub enum Error {
    /// A required setting is missing or invalid, detected before any vendor call
    #[error("Configuration error: {0}")]
    Config(String),

    /// The vendor call could not be sent or returned a non-success status
    #[error("Transport error: {0}")]
    Transport(String),

    /// The vendor reported a domain-level failure
    #[error("API error [{code}]: {message}")]
    Api {
        /// Vendor error code
        code: String,
        /// Vendor error detail
        message: String,
    },

    /// The response did not contain the identifier we expected
    #[error("Ambiguous response: {0}")]
    AmbiguousResponse(String),

    /// Operation context cancelled or timed out
    #[error("Operation cancelled: {0}")]
    Cancelled(CancelReason),

    /// Fan-out bind finished with some sub-resources failing
    #[error("Partial failure: {0}")]
    PartialFailure(PartialFailure),

    /// An asynchronous vendor deployment task ended in failure
    #[error("Deployment task {id} failed: {message}")]
    TaskFailed {
        /// Vendor task identifier
        id: String,
        /// Vendor-provided reason
        message: String,
    },

    /// Certificate error
    #[error("Malformed certificate: {0}")]
    MalformedCertificate(String),

    /// Private key that the codecs cannot handle
    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    /// Discriminator not known to the provider registry
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Crypto error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Build an API error from vendor code and message
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Configuration,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Api { .. } => ErrorKind::ApiSemantic,
            Error::AmbiguousResponse(_) => ErrorKind::AmbiguousResponse,
            Error::Cancelled(_) => ErrorKind::Cancellation,
            Error::PartialFailure(_) => ErrorKind::PartialFailure,
            Error::TaskFailed { .. } => ErrorKind::TaskFailed,
            Error::MalformedCertificate(_) => ErrorKind::MalformedCertificate,
            Error::UnsupportedKey(_) => ErrorKind::UnsupportedKey,
            Error::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            Error::Crypto(_) | Error::Io(_) | Error::Json(_) | Error::Yaml(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the error came from the operation context
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("invalid endpoint URL: {}", err))
    }
}
