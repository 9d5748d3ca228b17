//! bulk-mailer: send one campaign to every address in a CSV file
//!
//! A run authenticates against a single SMTP relay, loads the recipient
//! column from a CSV file, validates an optional set of attachments and then
//! sends one message per recipient, pausing between sends so the provider's
//! rate limits and spam heuristics are respected.
//!
//! # Pipeline
//!
//! ```text
//! connect -> load recipients -> confirm -> compose draft -> validate attachments
//!         -> confirm -> send loop -> disconnect
//! ```
//!
//! Every stage returns a `Result`; the first fatal error short-circuits the
//! rest and the SMTP session is still released. See [`workflow::run`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bulk_mailer::config::MailerConfig;
//! use bulk_mailer::email::{recipients, SmtpConnector};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MailerConfig::load(None)?;
//! let connector = SmtpConnector::new(config.smtp.clone());
//! let addresses = recipients::load("contacts.csv")?;
//! println!("{} recipients", addresses.len());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod email;
pub mod error;
pub mod observability;
pub mod workflow;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::MailerError;

/// Prelude for the types most callers need
pub mod prelude {
    pub use crate::config::MailerConfig;
    pub use crate::email::{
        AttachmentLimits, AttachmentRef, Campaign, Composer, Credentials, MailSession,
        MailTransport, SendSummary, SmtpConnector, SmtpSession,
    };
    pub use crate::error::MailerError;
    pub use crate::workflow::{Operator, RunOutcome};
}
