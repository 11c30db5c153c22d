//! Configuration management for smtp-send

use crate::domain::{
    extract_recipients, parse_address, parse_addresses, TransportProperties, TransportScheme,
};
use crate::email::message::{eight_bit_body, parse_content_type, resolve_charset, EncodedSubject};
use crate::email::{Authenticator, PasswordSource, XPriority};
use crate::error::{ConfigError, Result};
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::Message;
use std::env;
use std::time::SystemTime;
use validator::Validate;

/// Charset used when none is given
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Connect/read timeout used when none is given
pub const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;

/// Everything needed to send one message.
///
/// Built once with [`MailConfig::builder`] and read-only afterwards.
#[derive(Debug, Clone, Validate)]
pub struct MailConfig {
    #[validate(length(min = 1, max = 255))]
    host: String,
    #[validate(range(min = 1))]
    port: u16,
    timeout_millis: u64,
    /// Plain SMTP instead of SMTPS
    use_smtp: bool,
    no_auth: bool,
    user: String,
    password: Option<String>,
    password_env_var: Option<String>,
    from: String,
    to: String,
    subject: String,
    body: String,
    is_html: bool,
    #[validate(length(min = 1))]
    charset: String,
    important: bool,
}

impl MailConfig {
    pub fn builder() -> MailConfigBuilder {
        MailConfigBuilder::default()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout_millis(&self) -> u64 {
        self.timeout_millis
    }

    pub fn use_smtp(&self) -> bool {
        self.use_smtp
    }

    pub fn no_auth(&self) -> bool {
        self.no_auth
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    /// Recipient list as given, semicolon separated
    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_html(&self) -> bool {
        self.is_html
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn important(&self) -> bool {
        self.important
    }

    pub fn transport_scheme(&self) -> TransportScheme {
        if self.use_smtp {
            TransportScheme::Smtp
        } else {
            TransportScheme::Smtps
        }
    }

    /// The password source; an explicit password takes precedence
    pub fn password_source(&self) -> PasswordSource {
        match (&self.password, &self.password_env_var) {
            (Some(pw), _) => PasswordSource::Explicit(pw.clone()),
            (None, Some(var)) => PasswordSource::EnvVar(var.clone()),
            (None, None) => PasswordSource::Unset,
        }
    }

    /// Resolve the password now, reading the environment if needed
    pub fn resolve_password(&self) -> Result<String> {
        self.password_source().resolve()
    }

    /// Check that a password can be resolved. Always succeeds with `no_auth`.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.no_auth {
            return Ok(());
        }
        self.resolve_password().map(|_| ())
    }

    pub fn build_transport_properties(&self) -> TransportProperties {
        let mut props = TransportProperties::new(self.transport_scheme());
        if !self.use_smtp {
            props.set(TransportProperties::STARTTLS_ENABLE, "true");
        }
        props.set(TransportProperties::HOST, self.host.clone());
        props.set(TransportProperties::PORT, self.port.to_string());
        props.set(TransportProperties::TIMEOUT, self.timeout_millis.to_string());
        props.set(TransportProperties::SEND_PARTIAL, "true");
        if !self.no_auth {
            props.set(TransportProperties::AUTH, "true");
        }
        props
    }

    /// Credentials provider; the password is resolved when it is asked for
    pub fn build_authenticator(&self) -> Authenticator {
        Authenticator::new(self.user.clone(), self.password_source())
    }

    pub fn from_address(&self) -> Result<Mailbox> {
        parse_address(&self.from)
    }

    pub fn recipients(&self) -> Vec<String> {
        extract_recipients(&self.to)
    }

    pub fn recipient_addresses(&self) -> Result<Vec<Mailbox>> {
        parse_addresses(&self.recipients())
    }

    /// MIME type of the body without parameters
    pub fn content_type(&self) -> &'static str {
        if self.is_html {
            "text/html"
        } else {
            "text/plain"
        }
    }

    /// Full `Content-Type` header value
    pub fn content_type_header(&self) -> String {
        let mut value = format!("{}; charset={}", self.content_type(), self.charset);
        if self.is_html {
            value.push_str("; format=flowed");
        }
        value
    }

    pub fn build_message(&self) -> Result<Message> {
        self.build_message_at(Utc::now())
    }

    /// Build the message with `sent_at` as its `Date`
    pub fn build_message_at(&self, sent_at: DateTime<Utc>) -> Result<Message> {
        let from = self.from_address()?;
        let recipients = self.recipient_addresses()?;
        let content_type = parse_content_type(&self.content_type_header())?;
        let encoding = resolve_charset(&self.charset)?;
        let subject = EncodedSubject::new(&self.subject, &self.charset, encoding)?;
        let body = eight_bit_body(&self.body, encoding)?;

        let mut builder = Message::builder()
            .from(from)
            .header(subject)
            .date(SystemTime::from(sent_at))
            .header(content_type);

        for recipient in recipients {
            builder = builder.to(recipient);
        }

        if self.important {
            builder = builder.header(XPriority::highest());
        }

        builder.body(body).map_err(|e| {
            ConfigError::MessageBuildFailed(format!(
                "Failed to create a message with subject '{}' for {}: {}",
                self.subject, self.to, e
            ))
        })
    }
}

/// Builder for [`MailConfig`]
#[derive(Debug, Clone)]
pub struct MailConfigBuilder {
    host: String,
    port: u16,
    timeout_millis: u64,
    use_smtp: bool,
    no_auth: bool,
    user: String,
    password: Option<String>,
    password_env_var: Option<String>,
    from: String,
    to: String,
    subject: String,
    body: String,
    is_html: bool,
    charset: Option<String>,
    important: bool,
}

impl Default for MailConfigBuilder {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            use_smtp: false,
            no_auth: false,
            user: String::new(),
            password: None,
            password_env_var: None,
            from: String::new(),
            to: String::new(),
            subject: String::new(),
            body: String::new(),
            is_html: false,
            charset: None,
            important: false,
        }
    }
}

impl MailConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout_millis(mut self, timeout_millis: u64) -> Self {
        self.timeout_millis = timeout_millis;
        self
    }

    pub fn use_smtp(mut self, use_smtp: bool) -> Self {
        self.use_smtp = use_smtp;
        self
    }

    pub fn no_auth(mut self, no_auth: bool) -> Self {
        self.no_auth = no_auth;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    pub fn password_env_var(mut self, name: Option<String>) -> Self {
        self.password_env_var = name.filter(|n| !n.is_empty());
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }

    /// `None` or an empty string falls back to [`DEFAULT_CHARSET`]
    pub fn charset(mut self, charset: Option<String>) -> Self {
        self.charset = charset;
        self
    }

    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    pub fn build(self) -> Result<MailConfig> {
        let charset = self
            .charset
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CHARSET.to_string());

        let config = MailConfig {
            host: self.host,
            port: self.port,
            timeout_millis: self.timeout_millis,
            use_smtp: self.use_smtp,
            no_auth: self.no_auth,
            user: self.user,
            password: self.password,
            password_env_var: self.password_env_var,
            from: self.from,
            to: self.to,
            subject: self.subject,
            body: self.body,
            is_html: self.is_html,
            charset,
            important: self.important,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `text` (default) or `json`
    pub log_format: String,
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            default_filter: "smtp_send=warn".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Load logging configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_format: env::var("LOG_FORMAT")
                .map(|f| f.to_lowercase())
                .unwrap_or(defaults.log_format),
            default_filter: defaults.default_filter,
        }
    }

    pub fn is_json(&self) -> bool {
        self.log_format == "json"
    }
}
