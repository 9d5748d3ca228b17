//! Campaign composition and delivery
//!
//! This module provides everything between a CSV file and the relay:
//! - Recipient loading from a CSV email column ([`recipients`])
//! - All-or-nothing attachment validation ([`attachments`])
//! - One MIME message per recipient ([`Composer`])
//! - SMTP and console backends behind the [`MailTransport`] trait
//! - The throttled send loop with failure bookkeeping ([`send_all`])
//!
//! # Examples
//!
//! ## Sending a campaign over an existing session
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use bulk_mailer::email::{
//!     send_all, Campaign, Composer, Connector, Credentials, MailSession, SmtpConnector,
//! };
//! use bulk_mailer::config::SmtpSettings;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = SmtpConnector::new(SmtpSettings::default());
//! let credentials = Credentials::new("me@gmail.com", "abcd efgh ijkl mnop");
//! let mut session = connector.connect(&credentials).await?;
//!
//! let campaign = Campaign::builder()
//!     .subject("Quarterly update")
//!     .text("Hello!")
//!     .recipients(vec!["a@example.com".to_string(), "b@example.com".to_string()])
//!     .delay(Duration::from_secs(2))
//!     .build();
//!
//! let composer = Composer::new(session.sender().clone(), &campaign);
//! let summary = send_all(&session, &composer, campaign.recipients(), campaign.delay(), |_| {}).await;
//! session.disconnect().await;
//! println!("sent {}/{}", summary.sent(), summary.total());
//! # Ok(())
//! # }
//! ```

pub mod attachments;
mod backend;
mod campaign;
mod composer;
mod error;
pub mod recipients;
mod send;
mod sender;

pub use attachments::{AttachmentLimits, AttachmentRef, MAX_ATTACHMENT_BYTES, MAX_ATTACHMENTS};
pub use backend::{
    console::{ConsoleConnector, ConsoleSession},
    smtp::{SmtpConnector, SmtpSession},
};
pub use campaign::{Campaign, CampaignBuilder, MessageDraft};
pub use composer::Composer;
pub use error::AttachmentError;
pub use send::{send_all, FailedRecipient, SendOutcome, SendProgress, SendSummary};
pub use sender::{Connector, Credentials, MailSession, MailTransport};

pub use lettre::message::Mailbox;

#[cfg(test)]
pub use sender::MockMailTransport;
