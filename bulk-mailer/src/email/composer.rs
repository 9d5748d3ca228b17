//! Per-recipient message composition
//!
//! Builds one MIME message per recipient from a [`Campaign`]. Attachment bytes
//! are read once when the composer is created and reused for every message.

use lettre::message::header::{self, ContentType};
use lettre::message::{Body, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use tracing::{debug, warn};

use super::{AttachmentRef, Campaign};
use crate::error::MailerError;

/// An attachment already encoded as a MIME part
#[derive(Debug, Clone)]
struct EncodedAttachment {
    filename: String,
    part: SinglePart,
}

/// Builds campaign messages addressed to one recipient each
#[derive(Debug, Clone)]
pub struct Composer {
    from: Mailbox,
    subject: String,
    text: String,
    html: Option<String>,
    attachments: Vec<EncodedAttachment>,
}

impl Composer {
    /// Create a composer for `campaign`, sending as `sender`
    ///
    /// The campaign's display name, if any, replaces the name on `sender`.
    /// Attachments that can no longer be read are logged and left out of
    /// every message.
    #[must_use]
    pub fn new(sender: Mailbox, campaign: &Campaign) -> Self {
        let name = campaign
            .sender_name()
            .map(str::to_string)
            .or(sender.name);
        let from = Mailbox::new(name, sender.email);

        let attachments = campaign
            .attachments()
            .iter()
            .filter_map(encode_attachment)
            .collect();

        Self {
            from,
            subject: campaign.subject().to_string(),
            text: campaign.text().to_string(),
            html: campaign.html().map(str::to_string),
            attachments,
        }
    }

    /// Mailbox placed in `From`
    #[must_use]
    pub const fn sender(&self) -> &Mailbox {
        &self.from
    }

    /// Number of attachments carried by each message
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Names of the attachments carried by each message
    pub fn attachment_names(&self) -> impl Iterator<Item = &str> {
        self.attachments.iter().map(|a| a.filename.as_str())
    }

    /// Build the message for one recipient
    ///
    /// # Errors
    ///
    /// Returns [`MailerError::Compose`] if `recipient` is not an address the
    /// message builder accepts.
    pub fn compose(&self, recipient: &str) -> Result<Message, MailerError> {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| MailerError::compose(format!("invalid recipient '{recipient}': {e}")))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(self.subject.as_str());

        let message = if self.attachments.is_empty() {
            match &self.html {
                Some(html) => builder.multipart(self.alternative(html)),
                None => builder.singlepart(self.plain()),
            }
        } else {
            let mut mixed = match &self.html {
                Some(html) => MultiPart::mixed().multipart(self.alternative(html)),
                None => MultiPart::mixed().singlepart(self.plain()),
            };
            for attachment in &self.attachments {
                mixed = mixed.singlepart(attachment.part.clone());
            }
            builder.multipart(mixed)
        };

        message.map_err(|e| MailerError::compose(e.to_string()))
    }

    fn plain(&self) -> SinglePart {
        SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(self.text.clone())
    }

    fn alternative(&self, html: &str) -> MultiPart {
        MultiPart::alternative().singlepart(self.plain()).singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(html.to_string()),
        )
    }
}

fn encode_attachment(attachment: &AttachmentRef) -> Option<EncodedAttachment> {
    let bytes = match attachment.read() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                path = %attachment.path().display(),
                error = %e,
                "attachment could not be read and will be left out"
            );
            return None;
        }
    };

    let content_type = match ContentType::parse(mime::APPLICATION_OCTET_STREAM.as_ref()) {
        Ok(content_type) => content_type,
        Err(e) => {
            warn!(error = %e, "invalid attachment content type");
            return None;
        }
    };

    // base64 accepts any input
    let body = Body::new_with_encoding(bytes, header::ContentTransferEncoding::Base64).ok()?;

    debug!(filename = attachment.filename(), bytes = body.len(), "attachment encoded");

    let part = SinglePart::builder()
        .header(content_type)
        .header(header::ContentDisposition::attachment(attachment.filename()))
        .body(body);

    Some(EncodedAttachment {
        filename: attachment.filename().to_string(),
        part,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::attachments::{self, AttachmentLimits};
    use tempfile::TempDir;

    fn sender() -> Mailbox {
        "me@example.com".parse().unwrap()
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).into_owned()
    }

    #[test]
    fn test_plain_message_headers() {
        let campaign = Campaign::builder()
            .subject("Hello")
            .text("Hello there")
            .build();
        let composer = Composer::new(sender(), &campaign);

        let message = composer.compose("a@x.com").unwrap();
        let raw = formatted(&message);

        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("From: me@example.com"));
        assert!(raw.contains("To: a@x.com"));
        assert!(raw.contains("text/plain"));
        assert!(!raw.contains("multipart/"));
        assert!(raw.contains("Hello there"));
    }

    #[test]
    fn test_each_message_has_only_its_recipient() {
        let campaign = Campaign::builder().subject("s").text("t").build();
        let composer = Composer::new(sender(), &campaign);

        for address in ["a@x.com", "b@y.com"] {
            let message = composer.compose(address).unwrap();
            let to = message.envelope().to();
            assert_eq!(to.len(), 1);
            assert_eq!(to[0].to_string(), address);
        }
    }

    #[test]
    fn test_display_name_in_from() {
        let campaign = Campaign::builder()
            .subject("s")
            .text("t")
            .sender_name("Jane Doe")
            .build();
        let composer = Composer::new(sender(), &campaign);

        assert_eq!(composer.sender().name.as_deref(), Some("Jane Doe"));
        let raw = formatted(&composer.compose("a@x.com").unwrap());
        assert!(raw.contains("Jane Doe"));
        assert!(raw.contains("<me@example.com>"));
    }

    #[test]
    fn test_html_alternative() {
        let campaign = Campaign::builder()
            .subject("s")
            .text("plain body")
            .html("<p>html body</p>")
            .build();
        let composer = Composer::new(sender(), &campaign);

        let raw = formatted(&composer.compose("a@x.com").unwrap());
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
        assert!(raw.find("text/plain").unwrap() < raw.find("text/html").unwrap());
    }

    #[test]
    fn test_attachment_part() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"hello").unwrap();
        let validated =
            attachments::validate([path.to_string_lossy()], &AttachmentLimits::default()).unwrap();

        let campaign = Campaign::builder()
            .subject("s")
            .text("see attached")
            .attachments(validated)
            .build();
        let composer = Composer::new(sender(), &campaign);
        assert_eq!(composer.attachment_count(), 1);
        assert_eq!(composer.attachment_names().collect::<Vec<_>>(), vec!["report.pdf"]);

        let raw = formatted(&composer.compose("a@x.com").unwrap());
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("application/octet-stream"));
        assert!(raw.contains("Content-Transfer-Encoding: base64"));
        assert!(raw.contains("filename=\"report.pdf\""));
        assert!(raw.contains("aGVsbG8="));
    }

    #[test]
    fn test_unreadable_attachment_is_omitted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.txt");
        std::fs::write(&path, b"soon deleted").unwrap();
        let validated =
            attachments::validate([path.to_string_lossy()], &AttachmentLimits::default()).unwrap();
        std::fs::remove_file(&path).unwrap();

        let campaign = Campaign::builder()
            .subject("s")
            .text("t")
            .attachments(validated)
            .build();
        let composer = Composer::new(sender(), &campaign);
        assert_eq!(composer.attachment_count(), 0);

        let raw = formatted(&composer.compose("a@x.com").unwrap());
        assert!(!raw.contains("gone.txt"));
    }

    #[test]
    fn test_invalid_recipient_is_compose_error() {
        let campaign = Campaign::builder().subject("s").text("t").build();
        let composer = Composer::new(sender(), &campaign);

        let err = composer.compose("not-an-address").unwrap_err();
        assert!(matches!(err, MailerError::Compose(_)));
        assert!(err.is_recipient_level());
    }
}
