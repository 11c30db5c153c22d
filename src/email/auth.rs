//! Deferred SMTP credentials

use crate::error::{ConfigError, Result};
use lettre::transport::smtp::authentication::Credentials;
use std::env;
use std::fmt;

/// Where the SMTP password comes from
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordSource {
    /// Given directly with `-pw`
    Explicit(String),
    /// Name of an environment variable, read when the password is needed
    EnvVar(String),
    /// Neither option was supplied
    Unset,
}

impl PasswordSource {
    /// Resolve the password. Environment variables are read on every call.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Explicit(pw) => Ok(pw.clone()),
            Self::EnvVar(name) => match env::var(name) {
                Ok(value) if !value.is_empty() => Ok(value),
                _ => Err(ConfigError::EnvVarNotSet(name.clone())),
            },
            Self::Unset => Err(ConfigError::MissingCredential),
        }
    }
}

// Never print the secret itself
impl fmt::Debug for PasswordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(_) => f.write_str("Explicit(***)"),
            Self::EnvVar(name) => f.debug_tuple("EnvVar").field(name).finish(),
            Self::Unset => f.write_str("Unset"),
        }
    }
}

/// Supplies `(user, password)` at authentication time.
///
/// Holds only a snapshot of the user name and the password source; the
/// password is looked up when [`Authenticator::credentials`] is called.
#[derive(Debug, Clone)]
pub struct Authenticator {
    user: String,
    source: PasswordSource,
}

impl Authenticator {
    pub fn new(user: impl Into<String>, source: PasswordSource) -> Self {
        Self {
            user: user.into(),
            source,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Resolve the password now and build lettre credentials
    pub fn credentials(&self) -> Result<Credentials> {
        let password = self.source.resolve()?;
        tracing::debug!(user = %self.user, "Resolved SMTP credentials");
        Ok(Credentials::new(self.user.clone(), password))
    }
}
