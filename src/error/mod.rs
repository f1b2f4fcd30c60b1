//! Error types for registry transfer operations
//!
//! Every network call converts its failure into one of the taxonomy kinds below at the
//! point where it happens; the sync orchestrator turns errors into per-artifact result
//! records instead of letting them escape.

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Coarse classification of a [`RegistryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Auth,
    Integrity,
    Transport,
    UnsupportedFormat,
    Io,
    Parse,
    Validation,
    Config,
}

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Chart, version, manifest or blob is absent
    #[error("Not found: {0}")]
    NotFound(String),
    /// Unexpected challenge status or unsupported challenge scheme
    #[error("Authentication error: {0}")]
    Auth(String),
    /// Transferred bytes do not match the descriptor
    #[error("Integrity error: {0}")]
    Integrity(String),
    /// Connection failures, timeouts and unclassified non-2xx responses
    #[error("Transport error: {0}")]
    Transport(String),
    /// Manifest media type outside the supported set
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::Auth(_) => ErrorKind::Auth,
            RegistryError::Integrity(_) => ErrorKind::Integrity,
            RegistryError::Transport(_) => ErrorKind::Transport,
            RegistryError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            RegistryError::Io(_) => ErrorKind::Io,
            RegistryError::Parse(_) => ErrorKind::Parse,
            RegistryError::Validation(_) => ErrorKind::Validation,
            RegistryError::Config(_) => ErrorKind::Config,
        }
    }

    /// Prefix the message with the operation that failed, keeping the kind
    pub fn context(self, context: &str) -> Self {
        match self {
            RegistryError::NotFound(msg) => {
                RegistryError::NotFound(format!("{}: {}", context, msg))
            }
            RegistryError::Auth(msg) => RegistryError::Auth(format!("{}: {}", context, msg)),
            RegistryError::Integrity(msg) => {
                RegistryError::Integrity(format!("{}: {}", context, msg))
            }
            RegistryError::Transport(msg) => {
                RegistryError::Transport(format!("{}: {}", context, msg))
            }
            RegistryError::UnsupportedFormat(msg) => {
                RegistryError::UnsupportedFormat(format!("{}: {}", context, msg))
            }
            RegistryError::Io(msg) => RegistryError::Io(format!("{}: {}", context, msg)),
            RegistryError::Parse(msg) => RegistryError::Parse(format!("{}: {}", context, msg)),
            RegistryError::Validation(msg) => {
                RegistryError::Validation(format!("{}: {}", context, msg))
            }
            RegistryError::Config(msg) => RegistryError::Config(format!("{}: {}", context, msg)),
        }
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(err: serde_yaml::Error) -> Self {
        RegistryError::Parse(format!("YAML: {}", err))
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "request")
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(format!("invalid URL: {}", err))
    }
}

impl From<std::string::FromUtf8Error> for RegistryError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        RegistryError::Parse(format!("UTF-8 conversion error: {}", err))
    }
}
