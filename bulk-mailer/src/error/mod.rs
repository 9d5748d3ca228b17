//! Error types and error handling

use std::path::PathBuf;

use thiserror::Error;

use crate::email::attachments::human_size;
use crate::email::AttachmentError;

/// Errors produced by a bulk mailing run
///
/// Everything except [`MailerError::Compose`] and [`MailerError::Send`] is
/// fatal to the run. Those two describe a single recipient and are recorded
/// by the send loop instead of being propagated.
#[derive(Debug, Error)]
pub enum MailerError {
    /// The relay rejected the credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The relay could not be reached or the session could not be secured
    #[error("connection error: {0}")]
    Connectivity(String),

    /// A file named by the operator does not exist
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The CSV header has no recognised email column
    #[error("no email column found in CSV (found columns: {})", .columns.join(", "))]
    NoEmailColumn {
        /// Header names discovered in the file
        columns: Vec<String>,
    },

    /// The CSV file could not be parsed
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The attachment set failed validation
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// A message could not be built for one recipient
    #[error("failed to compose message: {0}")]
    Compose(String),

    /// A message was rejected or lost while being submitted
    #[error("failed to send message: {0}")]
    Send(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Operator input could not be read
    #[error("prompt error: {0}")]
    Prompt(String),

    /// The operator pressed Ctrl-C while being asked a question
    #[error("interrupted by the operator")]
    Interrupted,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MailerError {
    /// Create an authentication error from a string message
    #[must_use]
    pub fn auth<T: Into<String>>(msg: T) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a connectivity error from a string message
    #[must_use]
    pub fn connectivity<T: Into<String>>(msg: T) -> Self {
        Self::Connectivity(msg.into())
    }

    /// Create a composition error from a string message
    #[must_use]
    pub fn compose<T: Into<String>>(msg: T) -> Self {
        Self::Compose(msg.into())
    }

    /// Create a send error from a string message
    #[must_use]
    pub fn send<T: Into<String>>(msg: T) -> Self {
        Self::Send(msg.into())
    }

    /// Create a configuration error from a string message
    #[must_use]
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Create a prompt error from a string message
    #[must_use]
    pub fn prompt<T: Into<String>>(msg: T) -> Self {
        Self::Prompt(msg.into())
    }

    /// Whether this error concerns a single recipient only
    #[must_use]
    pub const fn is_recipient_level(&self) -> bool {
        matches!(self, Self::Compose(_) | Self::Send(_))
    }

    /// Operator-facing tip for errors with a common fix
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Authentication(_) => Some(
                "Use an app password generated by your provider, not your regular account password."
                    .to_string(),
            ),
            Self::NoEmailColumn { .. } => Some(
                "The CSV needs a header named 'email', 'emails', 'e-mail' or 'e-mails'.".to_string(),
            ),
            Self::Attachment(err) => Some(attachment_hint(err)),
            _ => None,
        }
    }
}

fn attachment_hint(err: &AttachmentError) -> String {
    match err {
        AttachmentError::FileTooLarge { limit, .. } => {
            format!("Each attachment may be at most {}.", human_size(*limit))
        }
        AttachmentError::TotalTooLarge { limit, .. } => {
            format!("All attachments together may be at most {}.", human_size(*limit))
        }
        AttachmentError::TooMany { limit, .. } => {
            format!("At most {limit} files can be attached to one campaign.")
        }
        AttachmentError::NotFound(_) | AttachmentError::NotAFile(_) | AttachmentError::Io { .. } => {
            "Check the path; drag and drop from a file manager gives the full path.".to_string()
        }
    }
}

impl From<figment::Error> for MailerError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_email_column_lists_columns() {
        let err = MailerError::NoEmailColumn {
            columns: vec!["name".to_string(), "phone".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "no email column found in CSV (found columns: name, phone)"
        );
    }

    #[test]
    fn test_recipient_level_errors() {
        assert!(MailerError::send("550 mailbox unavailable").is_recipient_level());
        assert!(MailerError::compose("bad address").is_recipient_level());
        assert!(!MailerError::auth("535").is_recipient_level());
        assert!(!MailerError::connectivity("refused").is_recipient_level());
    }

    #[test]
    fn test_authentication_hint_mentions_app_password() {
        let hint = MailerError::auth("535 5.7.8").hint().unwrap();
        assert!(hint.contains("app password"));
        assert!(MailerError::connectivity("timeout").hint().is_none());
    }

    #[test]
    fn test_attachment_hint_uses_configured_limits() {
        let err = MailerError::from(AttachmentError::TotalTooLarge {
            total: 11 * 1024 * 1024,
            limit: 10 * 1024 * 1024,
        });
        assert_eq!(
            err.hint().as_deref(),
            Some("All attachments together may be at most 10 MB.")
        );

        let err = MailerError::from(AttachmentError::FileTooLarge {
            path: PathBuf::from("big.bin"),
            size: 2000,
            limit: 1500,
        });
        let hint = err.hint().unwrap();
        assert!(hint.contains("1500 bytes"));
        assert!(!hint.contains("25 MB"));

        let err = MailerError::from(AttachmentError::TooMany { count: 4, limit: 3 });
        assert!(err.hint().unwrap().contains("At most 3 files"));
    }

    #[test]
    fn test_interrupted_is_fatal() {
        assert!(!MailerError::Interrupted.is_recipient_level());
        assert!(MailerError::Interrupted.hint().is_none());
    }
}
