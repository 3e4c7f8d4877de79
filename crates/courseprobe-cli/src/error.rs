//! Error types for the CLI

use courseprobe::ProbeError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// The assignment flow did not complete
    #[error("Flow failed: {0}")]
    Flow(#[source] ProbeError),

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Library error outside the flow
    #[error("courseprobe error: {0}")]
    Probe(#[from] ProbeError),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Process exit code for this error
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Flow(_) => 1,
            Self::Config { .. } | Self::InvalidArgument { .. } => 2,
            Self::Probe(e) if e.is_setup() => 2,
            Self::Probe(_) | Self::Io(_) | Self::Json(_) => 3,
        }
    }
}
