//! Recipient list parsing and mailbox validation

use crate::error::{ConfigError, Result};
use lettre::message::Mailbox;

/// Recipient separator used on the command line
pub const RECIPIENT_SEPARATOR: char = ';';

/// Split a semicolon separated recipient list.
///
/// Entries are trimmed and empty entries are dropped. Order and duplicates
/// are preserved.
pub fn extract_recipients(raw: &str) -> Vec<String> {
    raw.split(RECIPIENT_SEPARATOR)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an RFC 5322 mailbox (`a@b.com` or `Name <a@b.com>`).
pub fn parse_address(raw: &str) -> Result<Mailbox> {
    raw.trim().parse::<Mailbox>().map_err(|e| {
        tracing::debug!(address = raw, error = %e, "Rejected mailbox");
        ConfigError::InvalidAddress(raw.to_string())
    })
}

/// Parse every entry of a list, failing on the first invalid one
pub fn parse_addresses<S: AsRef<str>>(recipients: &[S]) -> Result<Vec<Mailbox>> {
    recipients
        .iter()
        .map(|r| parse_address(r.as_ref()))
        .collect()
}
