//! smtp-send - send one mail message over SMTP or SMTPS
//!
//! This crate turns a flat set of command line options into a transport
//! session, a validated recipient list and an encoded message, and sends
//! that message exactly once.

pub mod cli;
pub mod config;
pub mod domain;
pub mod email;
pub mod error;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::MailConfig;
pub use error::{ConfigError, SendError};
pub use service::{send_mail, MailService};
