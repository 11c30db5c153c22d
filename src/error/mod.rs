//! Unified error handling for smtp-send

use crate::email::TransportError;
use thiserror::Error;

/// Result type for configuration and message-building operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors detected while validating input or deriving the message.
///
/// All of these are raised before a connection to the mail server is opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Not a valid email address: '{0}'")]
    InvalidAddress(String),

    #[error("A password or an environment variable with the password is mandatory")]
    MissingCredential,

    #[error("The environment variable {0} is not set")]
    EnvVarNotSet(String),

    #[error("Failed to build message: {0}")]
    MessageBuildFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Whether this error is caused by bad user input (as opposed to a
    /// failure inside the message encoder).
    pub fn is_user_input(&self) -> bool {
        !matches!(self, ConfigError::MessageBuildFailed(_))
    }
}

// Conversion from validation errors
impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigError::Validation(errors.to_string())
    }
}

/// Errors returned by the send orchestrator
#[derive(Error, Debug)]
pub enum SendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to send mail with subject '{subject}' to {to}")]
    TransportFailure {
        subject: String,
        to: String,
        #[source]
        source: TransportError,
    },
}

impl SendError {
    /// Process exit code for this failure: `1` for input errors, `2` otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            SendError::Config(e) if e.is_user_input() => 1,
            _ => 2,
        }
    }

    /// True when the failure happened before any network connection.
    pub fn is_preflight(&self) -> bool {
        matches!(self, SendError::Config(_))
    }
}
