//! Transport trait abstraction
//!
//! A run talks to the relay through three seams:
//! - [`Connector`] authenticates and opens a session
//! - [`MailSession`] is the open, exclusively owned session
//! - [`MailTransport`] submits one message, the only capability the send loop needs

use std::fmt;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::Message;

use crate::error::MailerError;

/// Trait for submitting a single message
///
/// Implemented by the SMTP and console sessions, and by test doubles.
///
/// # Examples
///
/// ```rust,no_run
/// use bulk_mailer::email::{Connector, Credentials, MailTransport, SmtpConnector};
/// use bulk_mailer::config::SmtpSettings;
/// use lettre::Message;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = SmtpConnector::new(SmtpSettings::default());
/// let session = connector.connect(&Credentials::new("me@gmail.com", "app-password")).await?;
///
/// let message = Message::builder()
///     .from("me@gmail.com".parse()?)
///     .to("you@example.com".parse()?)
///     .subject("Hello!")
///     .body(String::from("Hello, World!"))?;
///
/// session.send(message).await?;
/// # Ok(())
/// # }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Submit one message
    ///
    /// # Errors
    ///
    /// Returns [`MailerError::Send`] if the relay rejects the message or the
    /// connection drops while it is being submitted.
    async fn send(&self, message: Message) -> Result<(), MailerError>;
}

/// An authenticated session with the relay
///
/// Owned exclusively by one run. Must be released with
/// [`MailSession::disconnect`]; implementations also release on drop.
#[async_trait]
pub trait MailSession: MailTransport {
    /// Mailbox used in the `From` header of every message
    fn sender(&self) -> &Mailbox;

    /// Release the session
    ///
    /// Idempotent: calls after the first only log.
    async fn disconnect(&mut self);
}

/// Opens authenticated sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// Session type produced by a successful connect
    type Session: MailSession;

    /// Authenticate and return an open session
    ///
    /// # Errors
    ///
    /// - [`MailerError::Authentication`] if the relay rejects the credentials
    /// - [`MailerError::Connectivity`] for network, TLS or protocol failures
    async fn connect(&self, credentials: &Credentials) -> Result<Self::Session, MailerError>;
}

/// Login credentials for the relay
///
/// The password is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials from a username and an (application-specific) password
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into().trim().to_string(),
            password: password.into().trim().to_string(),
        }
    }

    /// Login name, usually the full mailbox address
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Secret used for AUTH
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl From<&Credentials> for lettre::transport::smtp::authentication::Credentials {
    fn from(credentials: &Credentials) -> Self {
        Self::new(credentials.username.clone(), credentials.password.clone())
    }
}
