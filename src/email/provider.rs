//! Mail transport trait and error types

use async_trait::async_trait;
use lettre::Message;
use thiserror::Error;

/// Transport error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Send failed: {0}")]
    Rejected(String),

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Invalid session: {0}")]
    InvalidSession(String),
}

/// Result of a message transmission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Envelope recipients the server accepted
    pub accepted: Vec<String>,
    /// Envelope recipients the server refused
    pub rejected: Vec<String>,
}

/// A connection to a mail server that carries exactly one message.
///
/// Callers must invoke [`MailTransport::close`] after a successful
/// [`MailTransport::connect`], whether or not `send` succeeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send {
    /// Open the connection and authenticate if the session requires it
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Transmit the message to all of its envelope recipients
    async fn send(&mut self, message: &Message) -> Result<Delivery, TransportError>;

    /// Close the connection. Calling this on a closed transport is a no-op.
    async fn close(&mut self);

    /// Scheme name, `smtp` or `smtps`
    fn protocol(&self) -> &'static str;
}
