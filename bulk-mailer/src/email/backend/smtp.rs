//! SMTP backend
//!
//! Uses the `lettre` crate to authenticate against the relay once and then
//! submit every campaign message over that session.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::AsyncSmtpTransportBuilder;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use super::sender_mailbox;
use crate::config::{SmtpSettings, TlsMode};
use crate::email::{Connector, Credentials, MailSession, MailTransport};
use crate::error::MailerError;

/// SMTP reply codes that mean the credentials were refused
const AUTH_FAILURE_CODES: [u16; 4] = [454, 530, 534, 535];

/// Opens authenticated sessions with the configured relay
///
/// # Examples
///
/// ```rust,no_run
/// use bulk_mailer::config::SmtpSettings;
/// use bulk_mailer::email::{Connector, Credentials, MailSession, SmtpConnector};
///
/// # async fn example() -> Result<(), bulk_mailer::MailerError> {
/// let connector = SmtpConnector::new(SmtpSettings::default());
/// let mut session = connector
///     .connect(&Credentials::new("me@gmail.com", "abcd efgh ijkl mnop"))
///     .await?;
/// println!("logged in as {}", session.sender());
/// session.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    settings: SmtpSettings,
}

impl SmtpConnector {
    /// Create a connector for the given relay settings
    #[must_use]
    pub const fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    /// Relay settings in use
    #[must_use]
    pub const fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    fn builder(&self) -> Result<AsyncSmtpTransportBuilder, MailerError> {
        let host = self.settings.host.as_str();
        let tls_parameters = || {
            TlsParameters::new(host.to_string())
                .map_err(|e| MailerError::connectivity(format!("TLS parameters error: {e}")))
        };

        let builder = match self.settings.tls {
            TlsMode::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| MailerError::connectivity(e.to_string()))?,
            TlsMode::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| MailerError::connectivity(e.to_string()))?,
            TlsMode::Opportunistic => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                .tls(Tls::Opportunistic(tls_parameters()?)),
            TlsMode::None => {
                warn!(host, "connecting without TLS, credentials travel in clear text");
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            }
        };

        Ok(builder
            .port(self.settings.port)
            .timeout(Some(Duration::from_secs(self.settings.timeout_secs))))
    }
}

#[async_trait]
impl Connector for SmtpConnector {
    type Session = SmtpSession;

    async fn connect(&self, credentials: &Credentials) -> Result<SmtpSession, MailerError> {
        let sender = sender_mailbox(self.settings.from_address.as_deref(), credentials)?;

        info!(
            host = %self.settings.host,
            port = self.settings.port,
            tls = ?self.settings.tls,
            username = credentials.username(),
            "connecting to relay"
        );

        let transport = self.builder()?.credentials(credentials.into()).build();

        // Opening the pooled connection runs EHLO, STARTTLS and AUTH; NOOP proves it is usable.
        match transport.test_connection().await {
            Ok(true) => {}
            Ok(false) => {
                return Err(MailerError::connectivity(format!(
                    "{} did not accept the session",
                    self.settings.host
                )));
            }
            Err(e) => return Err(classify(e.status().map(u16::from), e.to_string())),
        }

        info!(sender = %sender, "authenticated");
        Ok(SmtpSession {
            transport: Some(transport),
            sender,
            host: self.settings.host.clone(),
        })
    }
}

/// Map a connect failure to an error kind by its SMTP reply code
fn classify(code: Option<u16>, message: String) -> MailerError {
    match code {
        Some(code) if AUTH_FAILURE_CODES.contains(&code) => MailerError::Authentication(message),
        _ => MailerError::Connectivity(message),
    }
}

/// An authenticated SMTP session
///
/// Released by [`MailSession::disconnect`]. Dropping a session that was never
/// disconnected still closes it, with a warning.
pub struct SmtpSession {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    sender: Mailbox,
    host: String,
}

impl std::fmt::Debug for SmtpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSession")
            .field("host", &self.host)
            .field("sender", &self.sender)
            .field("open", &self.is_open())
            .finish()
    }
}

impl SmtpSession {
    /// Whether the session has not been released yet
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.transport.is_some()
    }
}

#[async_trait]
impl MailTransport for SmtpSession {
    async fn send(&self, message: Message) -> Result<(), MailerError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| MailerError::send("session already disconnected"))?;

        let response = transport
            .send(message)
            .await
            .map_err(|e| MailerError::send(e.to_string()))?;

        debug!(code = %response.code(), "message accepted");
        Ok(())
    }
}

#[async_trait]
impl MailSession for SmtpSession {
    fn sender(&self) -> &Mailbox {
        &self.sender
    }

    async fn disconnect(&mut self) {
        match self.transport.take() {
            Some(transport) => {
                // dropping the pool sends QUIT on its idle connection
                drop(transport);
                info!(host = %self.host, "disconnected from relay");
            }
            None => debug!(host = %self.host, "disconnect called on a closed session"),
        }
    }
}

impl Drop for SmtpSession {
    fn drop(&mut self) {
        if self.transport.take().is_some() {
            warn!(host = %self.host, "SMTP session dropped without disconnect");
        }
    }
}
