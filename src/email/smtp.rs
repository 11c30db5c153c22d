//! SMTP transport implementation using lettre's low-level connection

use super::provider::{Delivery, MailTransport, TransportError};
use super::session::SessionSettings;
use async_trait::async_trait;
use lettre::{
    transport::smtp::{
        authentication::Mechanism,
        client::{AsyncSmtpConnection, TlsParameters},
        commands::{Data, Mail, Rcpt},
        extension::{ClientId, Extension, MailBodyParameter, MailParameter},
    },
    Message,
};
use tracing::{debug, info, warn};

/// SMTP/SMTPS transport carrying one message per connection
pub struct SmtpMailTransport {
    settings: SessionSettings,
    hello_name: ClientId,
    connection: Option<AsyncSmtpConnection>,
}

impl SmtpMailTransport {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            hello_name: ClientId::Domain("localhost".to_string()),
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn tls_parameters(&self) -> Result<Option<TlsParameters>, TransportError> {
        if !self.settings.scheme.is_tls() {
            return Ok(None);
        }
        TlsParameters::new(self.settings.host.clone())
            .map(Some)
            .map_err(|e| TransportError::Tls(e.to_string()))
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let host = self.settings.host.clone();
        let port = self.settings.port;
        let tls_parameters = self.tls_parameters()?;

        debug!(
            scheme = %self.settings.scheme,
            host = %host,
            port,
            timeout_ms = self.settings.timeout.map(|t| t.as_millis() as u64),
            "Connecting to mail server"
        );

        let mut conn = AsyncSmtpConnection::connect_tokio1(
            (host.as_str(), port),
            self.settings.timeout,
            &self.hello_name,
            tls_parameters,
            None,
        )
        .await
        .map_err(|e| TransportError::Connection(format!("{}:{}: {}", host, port, e)))?;

        if self.settings.starttls && self.settings.scheme.is_tls() {
            debug!("Session uses implicit TLS, STARTTLS upgrade not needed");
        }

        if let Some(authenticator) = &self.settings.authenticator {
            let credentials = match authenticator.credentials() {
                Ok(credentials) => credentials,
                Err(e) => {
                    let _ = conn.quit().await;
                    return Err(TransportError::Authentication(e.to_string()));
                }
            };

            if let Err(e) = conn
                .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
                .await
            {
                let _ = conn.quit().await;
                return Err(TransportError::Authentication(e.to_string()));
            }
            debug!(user = authenticator.user(), "Authenticated");
        }

        self.connection = Some(conn);
        Ok(())
    }

    async fn send(&mut self, message: &Message) -> Result<Delivery, TransportError> {
        let send_partial = self.settings.send_partial;
        let conn = self
            .connection
            .as_mut()
            .ok_or(TransportError::NotConnected)?;

        let envelope = message.envelope();
        let email = message.formatted();

        let mut parameters = Vec::new();
        if conn.server_info().supports_feature(Extension::EightBitMime) {
            parameters.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        }
        conn.command(Mail::new(envelope.from().cloned(), parameters))
            .await
            .map_err(|e| TransportError::Rejected(format!("MAIL FROM: {}", e)))?;

        let mut delivery = Delivery::default();
        for recipient in envelope.to() {
            match conn.command(Rcpt::new(recipient.clone(), vec![])).await {
                Ok(_) => delivery.accepted.push(recipient.to_string()),
                Err(e) if send_partial => {
                    warn!(recipient = %recipient, error = %e, "Recipient rejected");
                    delivery.rejected.push(recipient.to_string());
                }
                Err(e) => {
                    return Err(TransportError::Rejected(format!(
                        "RCPT TO {}: {}",
                        recipient, e
                    )))
                }
            }
        }

        if delivery.accepted.is_empty() {
            return Err(TransportError::Rejected(format!(
                "No recipient was accepted ({})",
                delivery.rejected.join(", ")
            )));
        }

        conn.command(Data)
            .await
            .map_err(|e| TransportError::Rejected(format!("DATA: {}", e)))?;
        let response = conn
            .message(&email)
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        info!(
            accepted = delivery.accepted.len(),
            rejected = delivery.rejected.len(),
            response = ?response.message().collect::<Vec<_>>(),
            "Message accepted by server"
        );

        Ok(delivery)
    }

    async fn close(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            if let Err(e) = conn.quit().await {
                debug!(error = %e, "QUIT failed, dropping connection");
            }
        }
    }

    fn protocol(&self) -> &'static str {
        self.settings.scheme.as_str()
    }
}
