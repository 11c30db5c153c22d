//! Service layer

pub mod mail;

pub use mail::{send_mail, MailService, TransportFactory};
