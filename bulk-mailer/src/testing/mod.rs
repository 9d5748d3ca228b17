//! Testing utilities
//!
//! In-memory stand-ins for the relay and the operator, for exercising a full
//! [`workflow::run`](crate::workflow::run) without a network or a terminal.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::Message;

use crate::email::{
    AttachmentError, AttachmentLimits, Campaign, Connector, Credentials, MailSession,
    MailTransport, MessageDraft, SendProgress,
};
use crate::error::MailerError;
use crate::workflow::{AttachmentDecision, Operator};

#[derive(Debug, Default)]
struct Recorder {
    sent: Vec<SentMessage>,
    sessions: usize,
    disconnects: usize,
}

#[derive(Debug, Clone)]
struct SentMessage {
    recipient: String,
    raw: String,
}

/// Connector whose sessions record messages in memory
///
/// # Examples
///
/// ```rust
/// use bulk_mailer::email::{Connector, Credentials, MailSession, MailTransport};
/// use bulk_mailer::testing::RecordingConnector;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = RecordingConnector::new();
/// let mut session = connector.connect(&Credentials::new("me@example.com", "pw")).await?;
///
/// let message = lettre::Message::builder()
///     .from("me@example.com".parse()?)
///     .to("user@example.com".parse()?)
///     .subject("Test")
///     .body(String::from("Hello"))?;
/// session.send(message).await?;
/// session.disconnect().await;
///
/// assert_eq!(connector.recipients(), vec!["user@example.com"]);
/// assert_eq!(connector.disconnects(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    state: Arc<Mutex<Recorder>>,
    reject_credentials: bool,
    failing: Vec<String>,
}

impl RecordingConnector {
    /// Create a connector that accepts any credentials
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector that refuses every login with a 535 reply
    #[must_use]
    pub fn rejecting_credentials() -> Self {
        Self {
            reject_credentials: true,
            ..Self::default()
        }
    }

    /// Make sends to `addresses` fail with a 550 reply
    #[must_use]
    pub fn failing_for<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing = addresses.into_iter().map(Into::into).collect();
        self
    }

    /// Number of sessions opened
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.state.lock().unwrap().sessions
    }

    /// Number of sessions released
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }

    /// Number of messages accepted
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    /// Recipients of accepted messages, in send order
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|m| m.recipient.clone())
            .collect()
    }

    /// Accepted messages in wire format, in send order
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (should never happen in tests)
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|m| m.raw.clone())
            .collect()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    type Session = RecordingSession;

    async fn connect(&self, credentials: &Credentials) -> Result<RecordingSession, MailerError> {
        if self.reject_credentials {
            return Err(MailerError::auth(
                "535 5.7.8 Username and Password not accepted",
            ));
        }

        let sender: Mailbox = credentials
            .username()
            .parse()
            .map_err(|e| MailerError::config(format!("invalid sender: {e}")))?;

        self.state
            .lock()
            .map_err(|_| MailerError::connectivity("recorder poisoned"))?
            .sessions += 1;

        Ok(RecordingSession {
            state: Arc::clone(&self.state),
            failing: self.failing.clone(),
            sender,
            open: true,
        })
    }
}

/// Session produced by [`RecordingConnector`]
#[derive(Debug)]
pub struct RecordingSession {
    state: Arc<Mutex<Recorder>>,
    failing: Vec<String>,
    sender: Mailbox,
    open: bool,
}

#[async_trait]
impl MailTransport for RecordingSession {
    async fn send(&self, message: Message) -> Result<(), MailerError> {
        if !self.open {
            return Err(MailerError::send("session already disconnected"));
        }

        let recipient = message
            .envelope()
            .to()
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();

        if self.failing.contains(&recipient) {
            return Err(MailerError::send(format!(
                "550 5.1.1 <{recipient}>: mailbox unavailable"
            )));
        }

        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        self.state
            .lock()
            .map_err(|_| MailerError::send("recorder poisoned"))?
            .sent
            .push(SentMessage { recipient, raw });
        Ok(())
    }
}

#[async_trait]
impl MailSession for RecordingSession {
    fn sender(&self) -> &Mailbox {
        &self.sender
    }

    async fn disconnect(&mut self) {
        if self.open {
            self.open = false;
            if let Ok(mut state) = self.state.lock() {
                state.disconnects += 1;
            }
        }
    }
}

/// Operator that answers from a script and records what it was asked
#[derive(Debug, Clone)]
pub struct ScriptedOperator {
    credentials: Credentials,
    csv_path: PathBuf,
    confirm_recipients: bool,
    confirm_send: bool,
    draft: MessageDraft,
    attachments: Vec<String>,
    attachment_decision: AttachmentDecision,
    delay: Option<Duration>,
    stall_at: Option<&'static str>,
    interrupt_at: Option<&'static str>,
    asked: Vec<&'static str>,
    progress_events: usize,
    attachment_failures: usize,
    notices: Vec<String>,
}

impl ScriptedOperator {
    /// Operator that confirms everything and sends a short plain message
    #[must_use]
    pub fn new(csv_path: impl AsRef<Path>) -> Self {
        Self {
            credentials: Credentials::new("me@example.com", "app-password"),
            csv_path: csv_path.as_ref().to_path_buf(),
            confirm_recipients: true,
            confirm_send: true,
            draft: MessageDraft::new("Hello", "Hello from the test suite"),
            attachments: Vec::new(),
            attachment_decision: AttachmentDecision::ContinueWithout,
            delay: None,
            stall_at: None,
            interrupt_at: None,
            asked: Vec::new(),
            progress_events: 0,
            attachment_failures: 0,
            notices: Vec::new(),
        }
    }

    /// Log in with these credentials
    #[must_use]
    pub fn login(mut self, username: &str, password: &str) -> Self {
        self.credentials = Credentials::new(username, password);
        self
    }

    /// Answer "no" when shown the recipient list
    #[must_use]
    pub const fn decline_recipients(mut self) -> Self {
        self.confirm_recipients = false;
        self
    }

    /// Answer "no" at the final confirmation
    #[must_use]
    pub const fn decline_send(mut self) -> Self {
        self.confirm_send = false;
        self
    }

    /// Use this message content
    #[must_use]
    pub fn with_draft(mut self, draft: MessageDraft) -> Self {
        self.draft = draft;
        self
    }

    /// Offer these attachment paths the first time they are asked for
    #[must_use]
    pub fn attachments(mut self, paths: Vec<String>) -> Self {
        self.attachments = paths;
        self
    }

    /// Answer attachment failures with `decision`
    #[must_use]
    pub const fn on_attachment_failure(mut self, decision: AttachmentDecision) -> Self {
        self.attachment_decision = decision;
        self
    }

    /// Answer the delay question with `delay` instead of the default
    #[must_use]
    pub const fn delay_answer(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Never answer the named question, like an operator who walked away
    #[must_use]
    pub const fn stall_at(mut self, question: &'static str) -> Self {
        self.stall_at = Some(question);
        self
    }

    /// Press Ctrl-C at the named question
    #[must_use]
    pub const fn interrupt_at(mut self, question: &'static str) -> Self {
        self.interrupt_at = Some(question);
        self
    }

    /// Whether the named question was asked
    #[must_use]
    pub fn was_asked(&self, question: &str) -> bool {
        self.asked.iter().any(|asked| *asked == question)
    }

    /// Progress events received
    #[must_use]
    pub const fn progress_events(&self) -> usize {
        self.progress_events
    }

    /// Attachment failures reported
    #[must_use]
    pub const fn attachment_failures(&self) -> usize {
        self.attachment_failures
    }

    /// Notices received
    #[must_use]
    pub fn notices(&self) -> &[String] {
        &self.notices
    }
}

impl ScriptedOperator {
    async fn ask(&mut self, question: &'static str) -> Result<(), MailerError> {
        self.asked.push(question);
        if self.interrupt_at == Some(question) {
            return Err(MailerError::Interrupted);
        }
        if self.stall_at == Some(question) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn credentials(&mut self) -> Result<Credentials, MailerError> {
        self.ask("credentials").await?;
        Ok(self.credentials.clone())
    }

    async fn csv_path(&mut self) -> Result<PathBuf, MailerError> {
        self.ask("csv_path").await?;
        Ok(self.csv_path.clone())
    }

    async fn confirm_recipients(&mut self, _recipients: &[String]) -> Result<bool, MailerError> {
        self.ask("confirm_recipients").await?;
        Ok(self.confirm_recipients)
    }

    async fn draft(&mut self) -> Result<MessageDraft, MailerError> {
        self.ask("draft").await?;
        Ok(self.draft.clone())
    }

    async fn attachment_paths(
        &mut self,
        _limits: &AttachmentLimits,
    ) -> Result<Vec<String>, MailerError> {
        self.ask("attachment_paths").await?;
        // a retry gets an empty list
        Ok(std::mem::take(&mut self.attachments))
    }

    async fn attachment_failed(
        &mut self,
        _error: &AttachmentError,
    ) -> Result<AttachmentDecision, MailerError> {
        self.ask("attachment_failed").await?;
        self.attachment_failures += 1;
        Ok(self.attachment_decision)
    }

    async fn delay(&mut self, default: Duration) -> Result<Duration, MailerError> {
        self.ask("delay").await?;
        Ok(self.delay.unwrap_or(default))
    }

    async fn confirm_send(
        &mut self,
        _campaign: &Campaign,
        _sender: &Mailbox,
    ) -> Result<bool, MailerError> {
        self.ask("confirm_send").await?;
        Ok(self.confirm_send)
    }

    fn progress(&mut self, _event: SendProgress<'_>) {
        self.progress_events += 1;
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> Message {
        Message::builder()
            .from("me@example.com".parse().unwrap())
            .to(to.parse().unwrap())
            .subject("Test")
            .body(String::from("Hello"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_recording_session_records_and_fails() {
        let connector = RecordingConnector::new().failing_for(["bad@example.com"]);
        let mut session = connector
            .connect(&Credentials::new("me@example.com", "pw"))
            .await
            .unwrap();

        session.send(message("good@example.com")).await.unwrap();
        assert!(session.send(message("bad@example.com")).await.is_err());
        session.disconnect().await;
        session.disconnect().await;

        assert_eq!(connector.sessions_opened(), 1);
        assert_eq!(connector.recipients(), vec!["good@example.com"]);
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_rejecting_connector() {
        let connector = RecordingConnector::rejecting_credentials();
        let err = connector
            .connect(&Credentials::new("me@example.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailerError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_scripted_operator_records_questions() {
        let mut operator = ScriptedOperator::new("list.csv").attachments(vec!["a.pdf".into()]);
        let limits = AttachmentLimits::default();

        assert_eq!(operator.attachment_paths(&limits).await.unwrap(), vec!["a.pdf"]);
        assert!(operator.attachment_paths(&limits).await.unwrap().is_empty());
        assert!(operator.was_asked("attachment_paths"));
        assert!(!operator.was_asked("draft"));
    }

    #[tokio::test]
    async fn test_scripted_ctrl_c() {
        let mut operator = ScriptedOperator::new("list.csv").interrupt_at("csv_path");

        assert!(operator.credentials().await.is_ok());
        let err = operator.csv_path().await.unwrap_err();
        assert!(matches!(err, MailerError::Interrupted));
    }
}
