//! Throttled send loop
//!
//! Sends one message per recipient, in order, pausing between consecutive
//! sends. A failure for one recipient is recorded and the loop moves on;
//! every recipient is attempted exactly once.

use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use super::{Composer, MailTransport};

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The relay accepted the message
    Sent,
    /// Composition or submission failed
    Failed(String),
}

impl SendOutcome {
    /// Whether the relay accepted the message
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Progress event emitted once per recipient
#[derive(Debug, Clone, Copy)]
pub struct SendProgress<'a> {
    /// One-based position of this recipient
    pub index: usize,
    /// Number of recipients in the run
    pub total: usize,
    /// Recipient address
    pub address: &'a str,
    /// What happened
    pub outcome: &'a SendOutcome,
}

/// A recipient that could not be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecipient {
    /// Recipient address as loaded
    pub address: String,
    /// Reason reported by the composer or the relay
    pub reason: String,
}

/// Totals for one send loop
#[derive(Debug, Clone)]
pub struct SendSummary {
    total: usize,
    sent: usize,
    failed: Vec<FailedRecipient>,
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
}

impl SendSummary {
    fn new(total: usize) -> Self {
        let now = Local::now();
        Self {
            total,
            sent: 0,
            failed: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, address: &str, outcome: &SendOutcome) {
        match outcome {
            SendOutcome::Sent => self.sent += 1,
            SendOutcome::Failed(reason) => self.failed.push(FailedRecipient {
                address: address.to_string(),
                reason: reason.clone(),
            }),
        }
    }

    /// Recipients attempted
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Messages accepted by the relay
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }

    /// Number of failed recipients
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Failed recipients in send order, with reasons
    #[must_use]
    pub fn failed(&self) -> &[FailedRecipient] {
        &self.failed
    }

    /// Failed addresses in send order
    pub fn failed_addresses(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|f| f.address.as_str())
    }

    /// Whether every recipient was reached
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.sent == self.total
    }

    /// When the loop started
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// When the loop finished
    #[must_use]
    pub const fn finished_at(&self) -> DateTime<Local> {
        self.finished_at
    }
}

/// Send the campaign to every recipient
///
/// Sleeps `delay` between consecutive sends and never after the last one, so
/// N recipients spend (N-1) x `delay` waiting. `on_progress` is called once
/// per recipient after its attempt.
pub async fn send_all<T, F>(
    transport: &T,
    composer: &Composer,
    recipients: &[String],
    delay: Duration,
    mut on_progress: F,
) -> SendSummary
where
    T: MailTransport + ?Sized,
    F: FnMut(SendProgress<'_>) + Send,
{
    let total = recipients.len();
    let mut summary = SendSummary::new(total);

    info!(total, delay_secs = delay.as_secs(), "starting send loop");

    for (position, address) in recipients.iter().enumerate() {
        let outcome = match composer.compose(address) {
            Ok(message) => match transport.send(message).await {
                Ok(()) => SendOutcome::Sent,
                Err(e) => SendOutcome::Failed(e.to_string()),
            },
            Err(e) => SendOutcome::Failed(e.to_string()),
        };

        match &outcome {
            SendOutcome::Sent => info!(index = position + 1, total, %address, "sent"),
            SendOutcome::Failed(reason) => {
                warn!(index = position + 1, total, %address, %reason, "send failed");
            }
        }

        summary.record(address, &outcome);
        on_progress(SendProgress {
            index: position + 1,
            total,
            address,
            outcome: &outcome,
        });

        if position + 1 < total && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    summary.finished_at = Local::now();
    info!(
        sent = summary.sent(),
        failed = summary.failed_count(),
        total,
        "send loop finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{Campaign, MockMailTransport};
    use crate::error::MailerError;
    use lettre::message::Mailbox;
    use tokio::time::Instant;

    fn composer() -> Composer {
        let campaign = Campaign::builder().subject("s").text("t").build();
        let sender: Mailbox = "me@example.com".parse().unwrap();
        Composer::new(sender, &campaign)
    }

    fn addresses(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn first_recipient(message: &lettre::Message) -> String {
        message.envelope().to()[0].to_string()
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_loop() {
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(3).returning(|message| {
            if first_recipient(&message) == "r2@example.com" {
                Err(MailerError::send("550 mailbox unavailable"))
            } else {
                Ok(())
            }
        });

        let recipients = addresses(&["r1@example.com", "r2@example.com", "r3@example.com"]);
        let summary = send_all(&transport, &composer(), &recipients, Duration::ZERO, |_| {}).await;

        assert_eq!(summary.total(), 3);
        assert_eq!(summary.sent(), 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(
            summary.failed_addresses().collect::<Vec<_>>(),
            vec!["r2@example.com"]
        );
        assert!(summary.failed()[0].reason.contains("550"));
        assert!(!summary.is_complete_success());
    }

    #[tokio::test]
    async fn test_every_recipient_attempted_once_in_order() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();

        let mut transport = MockMailTransport::new();
        transport.expect_send().times(3).returning(move |message| {
            log.lock().unwrap().push(first_recipient(&message));
            Ok(())
        });

        let recipients = addresses(&["b@x.com", "a@x.com", "b@x.com"]);
        let summary = send_all(&transport, &composer(), &recipients, Duration::ZERO, |_| {}).await;

        assert_eq!(*seen.lock().unwrap(), recipients);
        assert!(summary.is_complete_success());
    }

    #[tokio::test]
    async fn test_compose_failure_recorded_without_sending() {
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(()));

        let recipients = addresses(&["broken", "ok@example.com"]);
        let summary = send_all(&transport, &composer(), &recipients, Duration::ZERO, |_| {}).await;

        assert_eq!(summary.sent(), 1);
        assert_eq!(summary.failed_addresses().collect::<Vec<_>>(), vec!["broken"]);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let mut transport = MockMailTransport::new();
        transport.expect_send().returning(|_| Ok(()));

        let mut events = Vec::new();
        let recipients = addresses(&["a@x.com", "b@x.com"]);
        send_all(&transport, &composer(), &recipients, Duration::ZERO, |p| {
            events.push((p.index, p.total, p.address.to_string(), p.outcome.is_sent()));
        })
        .await;

        assert_eq!(
            events,
            vec![
                (1, 2, "a@x.com".to_string(), true),
                (2, 2, "b@x.com".to_string(), true),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_sends_only() {
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(3).returning(|_| Ok(()));

        let recipients = addresses(&["a@x.com", "b@x.com", "c@x.com"]);
        let start = Instant::now();
        send_all(&transport, &composer(), &recipients, Duration::from_secs(2), |_| {}).await;

        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_recipient_never_waits() {
        let mut transport = MockMailTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(()));

        let start = Instant::now();
        send_all(
            &transport,
            &composer(),
            &addresses(&["solo@x.com"]),
            Duration::from_secs(30),
            |_| {},
        )
        .await;

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_empty_recipient_list() {
        let transport = MockMailTransport::new();
        let summary = send_all(&transport, &composer(), &[], Duration::from_secs(5), |_| {}).await;
        assert_eq!(summary.total(), 0);
        assert!(summary.is_complete_success());
    }
}
