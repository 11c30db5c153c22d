//! Mail transport for smtp-send
//!
//! - [`MailTransport`]: connect / send / close, one message per connection
//! - [`SmtpMailTransport`]: SMTP and SMTPS on top of lettre
//! - [`Authenticator`]: credentials resolved at authentication time

pub mod auth;
pub mod message;
pub mod provider;
pub mod session;
pub mod smtp;

pub use auth::{Authenticator, PasswordSource};
pub use message::XPriority;
pub use provider::{Delivery, MailTransport, TransportError};
pub use session::SessionSettings;
pub use smtp::SmtpMailTransport;
