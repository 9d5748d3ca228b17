//! Campaign definition
//!
//! A [`Campaign`] is assembled once per run with [`CampaignBuilder`] and has
//! no mutating API afterwards, so nothing can change between the final
//! confirmation and the last message.

use std::time::Duration;

use super::AttachmentRef;

/// Message content as entered by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDraft {
    /// Display name shown in `From`, if any
    pub sender_name: Option<String>,

    /// Subject line
    pub subject: String,

    /// Plain text body
    pub body: String,

    /// HTML alternative, if any
    pub html: Option<String>,
}

impl MessageDraft {
    /// Create a draft with a subject and plain text body
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Set the display name, treating a blank name as none
    #[must_use]
    pub fn sender_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.sender_name = (!name.trim().is_empty()).then(|| name.trim().to_string());
        self
    }

    /// Set the HTML alternative
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

/// One bulk mailing: content, recipients, attachments and pacing
#[derive(Debug, Clone)]
pub struct Campaign {
    subject: String,
    text: String,
    html: Option<String>,
    sender_name: Option<String>,
    recipients: Vec<String>,
    attachments: Vec<AttachmentRef>,
    delay: Duration,
}

impl Campaign {
    /// Start building a campaign
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use bulk_mailer::email::Campaign;
    ///
    /// let campaign = Campaign::builder()
    ///     .subject("Launch day")
    ///     .text("We are live!")
    ///     .sender_name("Acme Team")
    ///     .recipients(vec!["a@example.com".to_string()])
    ///     .delay(Duration::from_secs(3))
    ///     .build();
    ///
    /// assert_eq!(campaign.recipients().len(), 1);
    /// assert_eq!(campaign.sender_name(), Some("Acme Team"));
    /// ```
    #[must_use]
    pub fn builder() -> CampaignBuilder {
        CampaignBuilder::default()
    }

    /// Subject line
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Plain text body
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// HTML alternative
    #[must_use]
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    /// Display name for `From`
    #[must_use]
    pub fn sender_name(&self) -> Option<&str> {
        self.sender_name.as_deref()
    }

    /// Recipients in send order, duplicates included
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Validated attachments
    #[must_use]
    pub fn attachments(&self) -> &[AttachmentRef] {
        &self.attachments
    }

    /// Pause between consecutive sends
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

/// Builder for [`Campaign`]
#[derive(Debug, Clone, Default)]
pub struct CampaignBuilder {
    subject: String,
    text: String,
    html: Option<String>,
    sender_name: Option<String>,
    recipients: Vec<String>,
    attachments: Vec<AttachmentRef>,
    delay: Duration,
}

impl CampaignBuilder {
    /// Set the subject line
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the plain text body
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the HTML alternative
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Set the display name, treating a blank name as none
    #[must_use]
    pub fn sender_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.sender_name = (!name.trim().is_empty()).then(|| name.trim().to_string());
        self
    }

    /// Copy subject, body, HTML and display name from an operator draft
    #[must_use]
    pub fn draft(mut self, draft: MessageDraft) -> Self {
        self.subject = draft.subject;
        self.text = draft.body;
        self.html = draft.html;
        self.sender_name = draft.sender_name;
        self
    }

    /// Set the recipients
    #[must_use]
    pub fn recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Set the validated attachments
    #[must_use]
    pub fn attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Set the pause between consecutive sends
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Finish the campaign
    #[must_use]
    pub fn build(self) -> Campaign {
        Campaign {
            subject: self.subject,
            text: self.text,
            html: self.html,
            sender_name: self.sender_name,
            recipients: self.recipients,
            attachments: self.attachments,
            delay: self.delay,
        }
    }
}
