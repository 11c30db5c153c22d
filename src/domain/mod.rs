//! Domain types for smtp-send

pub mod address;
pub mod mail;

pub use address::{extract_recipients, parse_address, parse_addresses};
pub use mail::{SendReport, SendState, TransportProperties, TransportScheme};
