//! Run workflow
//!
//! One run is a fixed sequence of stages, each returning a `Result`:
//!
//! 1. authenticate
//! 2. load recipients
//! 3. confirm the recipient list
//! 4. compose the message
//! 5. validate attachments
//! 6. choose the delay and confirm the campaign
//! 7. send
//!
//! The operator answers every question through the [`Operator`] trait, so the
//! terminal front end and tests plug in the same way. The whole sequence is
//! raced against the interrupt future, and once stage 1 succeeds the session
//! is disconnected on every exit path.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use tracing::{info, warn};

use crate::config::MailerConfig;
use crate::email::{
    attachments, recipients, send_all, AttachmentError, AttachmentLimits, AttachmentRef,
    Campaign, Composer, Connector, Credentials, MailSession, MessageDraft, SendProgress,
    SendSummary,
};
use crate::error::MailerError;

/// How a run ended, when it did not fail
#[derive(Debug)]
pub enum RunOutcome {
    /// Every recipient was attempted
    Completed(SendSummary),
    /// The operator declined a confirmation or aborted at the attachment step
    Cancelled,
    /// The CSV file had no usable addresses
    NoRecipients,
    /// Ctrl-C arrived before the last recipient was attempted
    Interrupted {
        /// Recipients attempted before the run stopped
        attempted: usize,
    },
}

/// What to do after attachment validation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentDecision {
    /// Ask for the attachment paths again
    Retry,
    /// Send the campaign without attachments
    ContinueWithout,
    /// Abandon the run
    Abort,
}

/// The person (or script) answering the run's questions
///
/// Questions are async so a run can be interrupted while one is pending.
/// They fail with [`MailerError::Prompt`] when input cannot be read, or
/// [`MailerError::Interrupted`] when the operator pressed Ctrl-C at the
/// prompt. Notification methods default to doing nothing.
#[async_trait]
pub trait Operator: Send {
    /// Login name and application-specific password
    async fn credentials(&mut self) -> Result<Credentials, MailerError>;

    /// Authentication succeeded
    fn connected(&mut self, _sender: &Mailbox) {}

    /// Path of the recipient CSV file
    async fn csv_path(&mut self) -> Result<PathBuf, MailerError>;

    /// Show the loaded recipients and ask whether to continue
    async fn confirm_recipients(&mut self, recipients: &[String]) -> Result<bool, MailerError>;

    /// Display name, subject and body
    async fn draft(&mut self) -> Result<MessageDraft, MailerError>;

    /// Attachment paths within `limits`; empty for none
    async fn attachment_paths(
        &mut self,
        limits: &AttachmentLimits,
    ) -> Result<Vec<String>, MailerError>;

    /// Attachment validation failed
    async fn attachment_failed(
        &mut self,
        error: &AttachmentError,
    ) -> Result<AttachmentDecision, MailerError>;

    /// Pause between sends, offering `default`
    async fn delay(&mut self, default: Duration) -> Result<Duration, MailerError>;

    /// Show the finished campaign and ask for the go-ahead
    async fn confirm_send(
        &mut self,
        campaign: &Campaign,
        sender: &Mailbox,
    ) -> Result<bool, MailerError>;

    /// Sending is about to start
    fn sending_started(&mut self, _total: usize) {}

    /// One recipient was attempted
    fn progress(&mut self, _event: SendProgress<'_>) {}

    /// Something the operator should know that does not stop the run
    fn notice(&mut self, _message: &str) {}
}

/// Execute one complete run
///
/// `interrupt` is polled from the first question to the last message. When
/// it completes, the pending question or the send loop is abandoned, the
/// session (if any) is disconnected and the run ends as
/// [`RunOutcome::Interrupted`].
///
/// # Errors
///
/// Returns the first fatal error. Per-recipient failures are part of the
/// [`SendSummary`] instead.
///
/// # Examples
///
/// ```rust,no_run
/// use bulk_mailer::config::MailerConfig;
/// use bulk_mailer::email::SmtpConnector;
/// use bulk_mailer::workflow::{self, Operator, RunOutcome};
///
/// # async fn example(operator: &mut impl Operator) -> Result<(), bulk_mailer::MailerError> {
/// let config = MailerConfig::load(None)?;
/// let connector = SmtpConnector::new(config.smtp.clone());
///
/// let interrupt = async {
///     let _ = tokio::signal::ctrl_c().await;
/// };
///
/// match workflow::run(&connector, operator, &config, interrupt).await? {
///     RunOutcome::Completed(summary) => println!("sent {}/{}", summary.sent(), summary.total()),
///     other => println!("{other:?}"),
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run<C, O, I>(
    connector: &C,
    operator: &mut O,
    config: &MailerConfig,
    interrupt: I,
) -> Result<RunOutcome, MailerError>
where
    C: Connector,
    O: Operator + ?Sized,
    I: Future<Output = ()> + Send,
{
    tokio::pin!(interrupt);

    let login = async {
        let credentials = operator.credentials().await?;
        connector.connect(&credentials).await
    };
    let mut session = tokio::select! {
        session = login => match session {
            Ok(session) => session,
            Err(MailerError::Interrupted) => return Ok(interrupted(0)),
            Err(e) => return Err(e),
        },
        () = &mut interrupt => return Ok(interrupted(0)),
    };
    operator.connected(session.sender());

    let attempted = AtomicUsize::new(0);
    let result = tokio::select! {
        result = drive(&session, operator, config, &attempted) => match result {
            Err(MailerError::Interrupted) => Ok(interrupted(attempted.load(Ordering::Relaxed))),
            other => other,
        },
        () = &mut interrupt => Ok(interrupted(attempted.load(Ordering::Relaxed))),
    };

    session.disconnect().await;

    match &result {
        Ok(outcome) => info!(outcome = outcome_name(outcome), "run finished"),
        Err(e) => warn!(error = %e, "run aborted"),
    }
    result
}

fn interrupted(attempted: usize) -> RunOutcome {
    warn!(attempted, "interrupted by the operator");
    RunOutcome::Interrupted { attempted }
}

async fn drive<S, O>(
    session: &S,
    operator: &mut O,
    config: &MailerConfig,
    attempted: &AtomicUsize,
) -> Result<RunOutcome, MailerError>
where
    S: MailSession,
    O: Operator + ?Sized,
{
    let path = operator.csv_path().await?;
    let recipients = recipients::load(&path)?;
    if recipients.is_empty() {
        warn!(path = %path.display(), "no usable addresses in CSV file");
        return Ok(RunOutcome::NoRecipients);
    }

    if !operator.confirm_recipients(&recipients).await? {
        return Ok(RunOutcome::Cancelled);
    }

    let mut draft = operator.draft().await?;
    if draft.html.is_none() && config.sending.html_alternative {
        draft.html = Some(draft.body.clone());
    }

    let Some(attachments) = collect_attachments(operator, &config.attachments).await? else {
        return Ok(RunOutcome::Cancelled);
    };

    let delay = operator.delay(config.delay()).await?;

    let campaign = Campaign::builder()
        .draft(draft)
        .recipients(recipients)
        .attachments(attachments)
        .delay(delay)
        .build();

    if !operator.confirm_send(&campaign, session.sender()).await? {
        return Ok(RunOutcome::Cancelled);
    }

    let composer = Composer::new(session.sender().clone(), &campaign);
    operator.sending_started(campaign.recipients().len());

    let summary = send_all(
        session,
        &composer,
        campaign.recipients(),
        campaign.delay(),
        |event| {
            attempted.fetch_add(1, Ordering::Relaxed);
            operator.progress(event);
        },
    )
    .await;

    Ok(RunOutcome::Completed(summary))
}

/// Ask for attachments until they validate or the operator gives up
///
/// `None` means the operator chose to abort the run.
async fn collect_attachments<O>(
    operator: &mut O,
    limits: &AttachmentLimits,
) -> Result<Option<Vec<AttachmentRef>>, MailerError>
where
    O: Operator + ?Sized,
{
    loop {
        let mut paths = operator.attachment_paths(limits).await?;
        if paths.len() > limits.max_files {
            warn!(given = paths.len(), limit = limits.max_files, "too many attachments, extra files ignored");
            operator.notice(&format!(
                "Only the first {} attachments will be used.",
                limits.max_files
            ));
            paths.truncate(limits.max_files);
        }

        match attachments::validate(&paths, limits) {
            Ok(validated) => return Ok(Some(validated)),
            Err(e) => {
                warn!(error = %e, "attachment validation failed");
                match operator.attachment_failed(&e).await? {
                    AttachmentDecision::Retry => {}
                    AttachmentDecision::ContinueWithout => return Ok(Some(Vec::new())),
                    AttachmentDecision::Abort => return Ok(None),
                }
            }
        }
    }
}

const fn outcome_name(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed(_) => "completed",
        RunOutcome::Cancelled => "cancelled",
        RunOutcome::NoRecipients => "no_recipients",
        RunOutcome::Interrupted { .. } => "interrupted",
    }
}
