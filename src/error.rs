//! Error types and handling for Battery Reserve
//!
//! Every fatal condition of a run maps to one variant of [`ReserveError`].
//! The process surface turns any of them into exit code 1 after logging a
//! diagnostic; nothing in the core retries.

use thiserror::Error;

/// CONNACK return code for an unreachable or unavailable broker
pub const SERVER_UNAVAILABLE: u8 = 3;

/// Result type alias for Battery Reserve operations
pub type Result<T> = std::result::Result<T, ReserveError>;

/// Main error type for Battery Reserve
#[derive(Debug, Error)]
pub enum ReserveError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// A series does not have the expected row or column cardinality
    #[error("Shape error: series '{series}' expected {expected} rows, observed {observed}")]
    Shape {
        series: String,
        expected: usize,
        observed: usize,
    },

    /// A required query returned zero rows
    #[error("Empty result: series '{series}' returned no rows")]
    EmptyResult { series: String },

    /// A lookup by date or hour matched nothing
    #[error("No match: {lookup}")]
    NoMatch { lookup: String },

    /// A lookup by date or hour matched more than one row
    #[error("Ambiguous match: {lookup} matched {count} rows")]
    AmbiguousMatch { lookup: String, count: usize },

    /// Broker refused or never completed the connection handshake
    #[error("Connection refused by broker: return code {code} ({reason})")]
    ConnectionRefused { code: u8, reason: String },

    /// A publish could not be handed off to the transport
    #[error("Publish error on '{topic}': {message}")]
    Publish { topic: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Time-series source errors (bad response, unsupported field kinds)
    #[error("Source error: {message}")]
    Source { message: String },

    /// Prediction model errors
    #[error("Model error: {message}")]
    Model { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl ReserveError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ReserveError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        ReserveError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new shape error
    pub fn shape<S: Into<String>>(series: S, expected: usize, observed: usize) -> Self {
        ReserveError::Shape {
            series: series.into(),
            expected,
            observed,
        }
    }

    /// Create a new empty result error
    pub fn empty_result<S: Into<String>>(series: S) -> Self {
        ReserveError::EmptyResult {
            series: series.into(),
        }
    }

    /// Create a new no-match error
    pub fn no_match<S: Into<String>>(lookup: S) -> Self {
        ReserveError::NoMatch {
            lookup: lookup.into(),
        }
    }

    /// Create a new ambiguous match error
    pub fn ambiguous_match<S: Into<String>>(lookup: S, count: usize) -> Self {
        ReserveError::AmbiguousMatch {
            lookup: lookup.into(),
            count,
        }
    }

    /// Create a new connection refused error from a CONNACK return code
    pub fn connection_refused(code: u8) -> Self {
        let reason = match code {
            1 => "unacceptable protocol version",
            2 => "identifier rejected",
            3 => "server unavailable",
            4 => "bad user name or password",
            5 => "not authorized",
            _ => "unknown return code",
        };
        ReserveError::ConnectionRefused {
            code,
            reason: reason.to_string(),
        }
    }

    /// Handshake that failed before any CONNACK arrived, reported as server unavailable
    pub fn handshake_failed<S: Into<String>>(reason: S) -> Self {
        ReserveError::ConnectionRefused {
            code: SERVER_UNAVAILABLE,
            reason: reason.into(),
        }
    }

    /// Create a new publish error
    pub fn publish<T: Into<String>, S: Into<String>>(topic: T, message: S) -> Self {
        ReserveError::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ReserveError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        ReserveError::Network {
            message: message.into(),
        }
    }

    /// Create a new source error
    pub fn source_error<S: Into<String>>(message: S) -> Self {
        ReserveError::Source {
            message: message.into(),
        }
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(message: S) -> Self {
        ReserveError::Model {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ReserveError::Io {
            message: message.into(),
        }
    }

    /// Process exit code for this error. All validated fatal conditions exit 1.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

impl From<std::io::Error> for ReserveError {
    fn from(err: std::io::Error) -> Self {
        ReserveError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ReserveError {
    fn from(err: serde_yaml::Error) -> Self {
        ReserveError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ReserveError {
    fn from(err: serde_json::Error) -> Self {
        ReserveError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for ReserveError {
    fn from(err: csv::Error) -> Self {
        ReserveError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ReserveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ReserveError::timeout(err.to_string())
        } else {
            ReserveError::network(err.to_string())
        }
    }
}
