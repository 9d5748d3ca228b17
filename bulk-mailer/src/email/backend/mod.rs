//! Transport backends
//!
//! - [`smtp`]: authenticated SMTP through `lettre`
//! - [`console`]: logs messages instead of sending them (`--dry-run`)

pub mod console;
pub mod smtp;

use lettre::message::Mailbox;

use crate::email::Credentials;
use crate::error::MailerError;

/// Mailbox used in `From`: the configured address, else the login name
fn sender_mailbox(from_address: Option<&str>, credentials: &Credentials) -> Result<Mailbox, MailerError> {
    let address = from_address
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| credentials.username());

    address.parse().map_err(|e| {
        MailerError::config(format!(
            "'{address}' is not a valid sender address ({e}); set smtp.from_address"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_defaults_to_username() {
        let credentials = Credentials::new("me@example.com", "pw");
        let mailbox = sender_mailbox(None, &credentials).unwrap();
        assert_eq!(mailbox.email.to_string(), "me@example.com");
    }

    #[test]
    fn test_configured_sender_wins() {
        let credentials = Credentials::new("login-id", "pw");
        let mailbox = sender_mailbox(Some(" news@example.com "), &credentials).unwrap();
        assert_eq!(mailbox.email.to_string(), "news@example.com");
    }

    #[test]
    fn test_non_address_username_is_config_error() {
        let credentials = Credentials::new("login-id", "pw");
        let err = sender_mailbox(None, &credentials).unwrap_err();
        assert!(matches!(err, MailerError::Config(_)));
    }
}
