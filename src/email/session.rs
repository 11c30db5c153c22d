//! Transport session built from [`TransportProperties`]

use super::auth::Authenticator;
use super::provider::TransportError;
use crate::domain::{TransportProperties, TransportScheme};
use std::time::Duration;

/// Connection settings for a single transport
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub scheme: TransportScheme,
    pub host: String,
    pub port: u16,
    pub timeout: Option<Duration>,
    /// Continue when some recipients are rejected
    pub send_partial: bool,
    pub starttls: bool,
    /// Present iff the `auth` property is set
    pub authenticator: Option<Authenticator>,
}

impl SessionSettings {
    /// Read the session from a property map.
    ///
    /// An authenticator is required when `mail.<scheme>.auth=true` and is
    /// ignored otherwise.
    pub fn from_properties(
        props: &TransportProperties,
        authenticator: Option<Authenticator>,
    ) -> Result<Self, TransportError> {
        let host = props
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| missing(props, TransportProperties::HOST))?
            .to_string();
        let port = props
            .port()
            .ok_or_else(|| missing(props, TransportProperties::PORT))?;

        let authenticator = if props.flag(TransportProperties::AUTH) {
            Some(authenticator.ok_or_else(|| {
                TransportError::InvalidSession(format!(
                    "{} is set but no authenticator was given",
                    props.key(TransportProperties::AUTH)
                ))
            })?)
        } else {
            None
        };

        Ok(Self {
            scheme: props.scheme(),
            host,
            port,
            timeout: props.timeout(),
            send_partial: props.flag(TransportProperties::SEND_PARTIAL),
            starttls: props.flag(TransportProperties::STARTTLS_ENABLE),
            authenticator,
        })
    }

    pub fn requires_auth(&self) -> bool {
        self.authenticator.is_some()
    }
}

fn missing(props: &TransportProperties, name: &str) -> TransportError {
    TransportError::InvalidSession(format!("{} is missing or invalid", props.key(name)))
}
