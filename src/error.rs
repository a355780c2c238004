//! Error types for the model gateway.

use std::error::Error as StdError;
use std::fmt;
use std::result;
use tonic::Status;

/// A specialized Result type for gateway operations.
pub type Result<T> = result::Result<T, Error>;

/// The error type for gateway operations.
#[derive(Debug)]
pub enum Error {
    /// Unknown model, version or stage reference, or a missing artifact
    NotFound(String),
    /// Unsupported framework or stage, malformed payload
    InvalidArgument(String),
    /// Stage-change expectation mismatch
    FailedPrecondition(String),
    /// Required framework runtime is not present in this process
    Unavailable(String),
    /// Persistence and (de)serialization failures
    Internal(String),
    /// I/O errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// Errors reported by the RPC transport while reading a stream
    Transport(String),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::FailedPrecondition(msg) => write!(f, "Failed precondition: {}", msg),
            Error::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("background task failed: {}", err))
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => Status::not_found(msg),
            Error::InvalidArgument(msg) => Status::invalid_argument(msg),
            Error::FailedPrecondition(msg) => Status::failed_precondition(msg),
            Error::Unavailable(msg) => Status::unavailable(msg),
            Error::Internal(msg) => Status::internal(msg),
            Error::Io(err) => Status::internal(format!("I/O error: {}", err)),
            Error::Serialization(msg) => Status::internal(format!("Serialization error: {}", msg)),
            Error::Config(msg) => Status::failed_precondition(format!("Config error: {}", msg)),
            Error::Transport(msg) => Status::unavailable(msg),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Transport(status.message().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_status_codes_follow_error_kind() {
        let cases = [
            (Error::not_found("m"), Code::NotFound),
            (Error::invalid_argument("stage"), Code::InvalidArgument),
            (Error::FailedPrecondition("stage".into()), Code::FailedPrecondition),
            (Error::Unavailable("tensorflow".into()), Code::Unavailable),
            (Error::internal("disk"), Code::Internal),
            (Error::Serialization("bad".into()), Code::Internal),
        ];
        for (err, code) in cases {
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn test_display_keeps_message() {
        let err = Error::not_found("Model 'm1' does not exist");
        assert_eq!(err.to_string(), "Not found: Model 'm1' does not exist");
    }
}
