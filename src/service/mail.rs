//! Send orchestration: validate, open a transport, send once, close

use crate::config::MailConfig;
use crate::domain::{SendReport, SendState};
use crate::email::{MailTransport, SessionSettings, SmtpMailTransport, TransportError};
use crate::error::SendError;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Factory for building a [`MailTransport`] from a session.
///
/// Lets tests replace the network transport with a mock.
#[cfg_attr(test, mockall::automock)]
pub trait TransportFactory: Send + Sync {
    fn create(&self, session: SessionSettings) -> Box<dyn MailTransport>;
}

struct SmtpTransportFactory;

impl TransportFactory for SmtpTransportFactory {
    fn create(&self, session: SessionSettings) -> Box<dyn MailTransport> {
        Box::new(SmtpMailTransport::new(session))
    }
}

/// Service for sending a single message
pub struct MailService {
    transport_factory: Arc<dyn TransportFactory>,
}

impl Default for MailService {
    fn default() -> Self {
        Self::new()
    }
}

impl MailService {
    pub fn new() -> Self {
        Self {
            transport_factory: Arc::new(SmtpTransportFactory),
        }
    }

    pub fn with_factory(transport_factory: Arc<dyn TransportFactory>) -> Self {
        Self { transport_factory }
    }

    /// Send the configured message.
    ///
    /// Credential and address errors are returned before any connection is
    /// opened. Once connected, the transport is closed on every path. There
    /// is no retry.
    #[instrument(skip_all, fields(subject = %config.subject(), to = %config.to()))]
    pub async fn send(&self, config: &MailConfig) -> Result<SendReport, SendError> {
        let mut state = SendState::Unvalidated;

        if let Err(e) = config.validate_credentials() {
            enter(&mut state, SendState::Failed);
            return Err(e.into());
        }
        enter(&mut state, SendState::Validated);

        let properties = config.build_transport_properties();
        debug!(properties = %properties.to_json(), "Transport properties");

        let authenticator = (!config.no_auth()).then(|| config.build_authenticator());
        let session = SessionSettings::from_properties(&properties, authenticator)
            .map_err(|e| {
                enter(&mut state, SendState::Failed);
                transport_failure(config, e)
            })?;

        let sent_at = Utc::now();
        let message = config.build_message_at(sent_at).map_err(|e| {
            enter(&mut state, SendState::Failed);
            SendError::from(e)
        })?;

        let mut transport = self.transport_factory.create(session);
        if let Err(e) = transport.connect().await {
            enter(&mut state, SendState::Failed);
            return Err(transport_failure(config, e));
        }
        enter(&mut state, SendState::SessionOpen);

        let result = transport.send(&message).await;
        transport.close().await;
        debug!(protocol = transport.protocol(), "Transport closed");

        match result {
            Ok(delivery) => {
                enter(&mut state, SendState::MessageSent);
                info!(accepted = ?delivery.accepted, "Message sent");
                Ok(SendReport {
                    subject: config.subject().to_string(),
                    to: config.to().to_string(),
                    sent_at,
                    accepted: delivery.accepted,
                })
            }
            Err(e) => {
                enter(&mut state, SendState::Failed);
                error!(error = %e, "Sending failed");
                Err(transport_failure(config, e))
            }
        }
    }
}

/// Send with the default SMTP transport
pub async fn send_mail(config: &MailConfig) -> Result<SendReport, SendError> {
    MailService::new().send(config).await
}

fn enter(state: &mut SendState, next: SendState) {
    debug_assert!(!state.is_terminal(), "no transition out of {:?}", state);
    debug!(from = ?state, to = ?next, "Send state");
    *state = next;
}

fn transport_failure(config: &MailConfig, source: TransportError) -> SendError {
    SendError::TransportFailure {
        subject: config.subject().to_string(),
        to: config.to().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::provider::{Delivery, MockMailTransport};
    use crate::error::ConfigError;
    use mockall::Sequence;

    fn test_config() -> MailConfig {
        MailConfig::builder()
            .host("localhost")
            .port(2525)
            .user("myaccount")
            .password(Some("mypw".to_string()))
            .from("test@fuin.org")
            .to("other@fuin.org;not-existing@fuin.org")
            .subject("Test message")
            .body("hello")
            .use_smtp(true)
            .build()
            .unwrap()
    }

    fn service_with(transport: MockMailTransport) -> MailService {
        let mut factory = MockTransportFactory::new();
        let mut slot = Some(transport);
        factory.expect_create().times(1).returning(move |_| {
            Box::new(slot.take().expect("transport created once")) as Box<dyn MailTransport>
        });
        MailService::with_factory(Arc::new(factory))
    }

    fn unused_factory() -> MailService {
        let mut factory = MockTransportFactory::new();
        factory.expect_create().never();
        MailService::with_factory(Arc::new(factory))
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut transport = MockMailTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_connect()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|message| {
                Ok(Delivery {
                    accepted: message.envelope().to().iter().map(|a| a.to_string()).collect(),
                    rejected: vec![],
                })
            });
        transport
            .expect_close()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| ());
        transport.expect_protocol().returning(|| "smtp");

        let report = service_with(transport).send(&test_config()).await.unwrap();
        assert_eq!(report.subject, "Test message");
        assert_eq!(report.to, "other@fuin.org;not-existing@fuin.org");
        assert_eq!(report.accepted, vec!["other@fuin.org", "not-existing@fuin.org"]);
    }

    #[tokio::test]
    async fn test_send_failure_still_closes() {
        let mut transport = MockMailTransport::new();
        transport.expect_connect().times(1).returning(|| Ok(()));
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Rejected("550 no such user".to_string())));
        transport.expect_close().times(1).returning(|| ());
        transport.expect_protocol().returning(|| "smtp");

        let err = service_with(transport).send(&test_config()).await.unwrap_err();
        match err {
            SendError::TransportFailure { subject, to, source } => {
                assert_eq!(subject, "Test message");
                assert_eq!(to, "other@fuin.org;not-existing@fuin.org");
                assert_eq!(source, TransportError::Rejected("550 no such user".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_is_not_retried() {
        let mut transport = MockMailTransport::new();
        transport
            .expect_connect()
            .times(1)
            .returning(|| Err(TransportError::Connection("refused".to_string())));
        transport.expect_send().never();
        transport.expect_close().never();

        let err = service_with(transport).send(&test_config()).await.unwrap_err();
        assert!(matches!(err, SendError::TransportFailure { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_missing_credential_before_network() {
        let config = MailConfig::builder()
            .host("localhost")
            .port(2525)
            .user("myaccount")
            .from("test@fuin.org")
            .to("other@fuin.org")
            .subject("s")
            .body("b")
            .build()
            .unwrap();

        let err = unused_factory().send(&config).await.unwrap_err();
        assert!(matches!(err, SendError::Config(ConfigError::MissingCredential)));
        assert!(err.is_preflight());
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_env_var_not_set_before_network() {
        let config = MailConfig::builder()
            .host("localhost")
            .port(2525)
            .user("myaccount")
            .password_env_var(Some("SMTP_SEND_SERVICE_TEST_X".to_string()))
            .from("test@fuin.org")
            .to("other@fuin.org")
            .subject("s")
            .body("b")
            .build()
            .unwrap();

        let err = unused_factory().send(&config).await.unwrap_err();
        match err {
            SendError::Config(ConfigError::EnvVarNotSet(name)) => {
                assert_eq!(name, "SMTP_SEND_SERVICE_TEST_X")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_recipient_before_network() {
        let config = MailConfig::builder()
            .host("localhost")
            .port(2525)
            .no_auth(true)
            .from("test@fuin.org")
            .to("other@fuin.org;broken")
            .subject("s")
            .body("b")
            .build()
            .unwrap();

        let err = unused_factory().send(&config).await.unwrap_err();
        assert!(matches!(
            err,
            SendError::Config(ConfigError::InvalidAddress(ref raw)) if raw == "broken"
        ));
    }

    #[tokio::test]
    async fn test_noauth_session_has_no_authenticator() {
        let config = MailConfig::builder()
            .host("localhost")
            .port(2525)
            .no_auth(true)
            .use_smtp(true)
            .from("test@fuin.org")
            .to("other@fuin.org")
            .subject("s")
            .body("b")
            .build()
            .unwrap();

        let mut factory = MockTransportFactory::new();
        factory
            .expect_create()
            .withf(|session: &SessionSettings| !session.requires_auth() && session.send_partial)
            .times(1)
            .returning(|_| {
                let mut transport = MockMailTransport::new();
                transport
                    .expect_connect()
                    .returning(|| Err(TransportError::Connection("down".to_string())));
                Box::new(transport) as Box<dyn MailTransport>
            });

        let err = MailService::with_factory(Arc::new(factory))
            .send(&config)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::TransportFailure { .. }));
    }
}
