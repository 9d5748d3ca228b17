//! Console backend for dry runs
//!
//! Logs every message instead of sending it. Useful for checking a CSV file
//! and the composed messages without touching a relay.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::Message;
use tracing::{debug, info};

use super::sender_mailbox;
use crate::email::{Connector, Credentials, MailSession, MailTransport};
use crate::error::MailerError;

/// Connector that accepts any credentials and never opens a network connection
///
/// # Examples
///
/// ```rust
/// use bulk_mailer::email::{ConsoleConnector, Connector, Credentials, MailSession};
///
/// # async fn example() -> Result<(), bulk_mailer::MailerError> {
/// let connector = ConsoleConnector::new();
/// let mut session = connector.connect(&Credentials::new("me@example.com", "")).await?;
/// assert_eq!(session.sender().email.to_string(), "me@example.com");
/// session.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConsoleConnector {
    from_address: Option<String>,
    verbose: bool,
}

impl ConsoleConnector {
    /// Create a console connector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `address` in `From` instead of the login name
    #[must_use]
    pub fn from_address(mut self, address: Option<String>) -> Self {
        self.from_address = address;
        self
    }

    /// Also log the full formatted message at debug level
    #[must_use]
    pub const fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

#[async_trait]
impl Connector for ConsoleConnector {
    type Session = ConsoleSession;

    async fn connect(&self, credentials: &Credentials) -> Result<ConsoleSession, MailerError> {
        let sender = sender_mailbox(self.from_address.as_deref(), credentials)?;
        info!(sender = %sender, "dry run: no relay will be contacted");

        Ok(ConsoleSession {
            sender,
            verbose: self.verbose,
            delivered: AtomicUsize::new(0),
            open: true,
        })
    }
}

/// Session that logs messages instead of sending them
#[derive(Debug)]
pub struct ConsoleSession {
    sender: Mailbox,
    verbose: bool,
    delivered: AtomicUsize,
    open: bool,
}

impl ConsoleSession {
    /// Number of messages logged so far
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MailTransport for ConsoleSession {
    async fn send(&self, message: Message) -> Result<(), MailerError> {
        if !self.open {
            return Err(MailerError::send("session already disconnected"));
        }

        let to: Vec<String> = message.envelope().to().iter().map(ToString::to_string).collect();
        let subject = message.headers().get_raw("Subject").unwrap_or_default();
        let formatted = message.formatted();

        info!(
            from = %self.sender,
            to = ?to,
            subject,
            bytes = formatted.len(),
            "dry run: message not sent"
        );

        if self.verbose {
            debug!(message = %String::from_utf8_lossy(&formatted), "formatted message");
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl MailSession for ConsoleSession {
    fn sender(&self) -> &Mailbox {
        &self.sender
    }

    async fn disconnect(&mut self) {
        if self.open {
            self.open = false;
            info!(delivered = self.delivered(), "dry run finished");
        } else {
            debug!("disconnect called on a closed session");
        }
    }
}
