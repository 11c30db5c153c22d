//! Transport and send-result domain types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Transport scheme selected by the `-smtp` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportScheme {
    /// Plain SMTP
    Smtp,
    /// SMTP over implicit TLS
    Smtps,
}

impl TransportScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smtp => "smtp",
            Self::Smtps => "smtps",
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Smtps)
    }
}

impl fmt::Display for TransportScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session properties keyed as `mail.<scheme>.<name>`.
///
/// This is the only channel through which configuration reaches the
/// transport; see [`crate::email::SessionSettings::from_properties`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportProperties {
    #[serde(skip)]
    scheme: TransportScheme,
    #[serde(flatten)]
    entries: BTreeMap<String, String>,
}

impl TransportProperties {
    pub const HOST: &'static str = "host";
    pub const PORT: &'static str = "port";
    pub const TIMEOUT: &'static str = "timeout";
    pub const SEND_PARTIAL: &'static str = "sendpartial";
    pub const STARTTLS_ENABLE: &'static str = "starttls.enable";
    pub const AUTH: &'static str = "auth";

    pub fn new(scheme: TransportScheme) -> Self {
        Self {
            scheme,
            entries: BTreeMap::new(),
        }
    }

    /// Full key for a property name under this scheme
    pub fn key(&self, name: &str) -> String {
        format!("mail.{}.{}", self.scheme, name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let key = self.key(name);
        self.entries.insert(key, value.into());
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&self.key(name)).map(String::as_str)
    }

    /// True if the property is present and equal to `true`
    pub fn flag(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }

    pub fn scheme(&self) -> TransportScheme {
        self.scheme
    }

    pub fn host(&self) -> Option<&str> {
        self.get(Self::HOST)
    }

    pub fn port(&self) -> Option<u16> {
        self.get(Self::PORT).and_then(|p| p.parse().ok())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.get(Self::TIMEOUT)
            .and_then(|t| t.parse().ok())
            .map(Duration::from_millis)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// JSON rendering used for debug logging
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Lifecycle of a single send attempt. There is no retry transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Unvalidated,
    Validated,
    SessionOpen,
    MessageSent,
    Failed,
}

impl SendState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MessageSent | Self::Failed)
    }
}

/// Outcome of a successful send
#[derive(Debug, Clone)]
pub struct SendReport {
    pub subject: String,
    /// Recipient list exactly as given on the command line
    pub to: String,
    pub sent_at: DateTime<Utc>,
    /// Recipients the server accepted
    pub accepted: Vec<String>,
}

impl SendReport {
    /// One-line confirmation printed on success
    pub fn confirmation(&self) -> String {
        format!(
            "Successfully sent message '{}' to '{}'",
            self.subject, self.to
        )
    }
}
