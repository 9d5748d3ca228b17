//! Interactive prompts
//!
//! [`TerminalOperator`] answers the run's questions from command-line flags
//! where given and asks on the terminal otherwise. Terminal reads block, so
//! each one runs on tokio's blocking pool and the run can still be
//! interrupted while it waits.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bulk_mailer::email::attachments::human_size;
use bulk_mailer::email::{
    attachments, recipients, AttachmentError, AttachmentLimits, Campaign, Credentials, Mailbox,
    MessageDraft, SendOutcome, SendProgress,
};
use bulk_mailer::workflow::{AttachmentDecision, Operator};
use bulk_mailer::MailerError;
use console::{style, Emoji};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};

use crate::report;

static SUCCESS: Emoji<'_, '_> = Emoji("✓ ", "√ ");
static FAILURE: Emoji<'_, '_> = Emoji("✗ ", "x ");
static TIP: Emoji<'_, '_> = Emoji("💡 ", "* ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "! ");

/// Set while a blocking read owns the terminal
static READING_TERMINAL: AtomicBool = AtomicBool::new(false);

/// Line that ends a multi-line body, compared case-insensitively
pub const BODY_SENTINEL: &str = "END";

/// Number of addresses shown before the recipient confirmation
const PREVIEW_LIMIT: usize = 5;

/// Answers supplied up front on the command line
#[derive(Debug, Default)]
pub struct Answers {
    pub username: Option<String>,
    pub password: Option<String>,
    pub csv: Option<PathBuf>,
    pub sender_name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub html: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub delay: Option<u64>,
    /// Answer yes to both confirmations and skip optional questions
    pub assume_yes: bool,
}

/// Operator backed by the terminal
pub struct TerminalOperator {
    answers: Answers,
    progress: Option<ProgressBar>,
}

impl TerminalOperator {
    pub const fn new(answers: Answers) -> Self {
        Self {
            answers,
            progress: None,
        }
    }

    /// Clear the progress bar if sending stopped early
    pub fn finish_progress(&mut self) {
        if let Some(bar) = self.progress.take() {
            bar.abandon();
        }
    }

    async fn confirm(&self, prompt: String) -> Result<bool, MailerError> {
        if self.answers.assume_yes {
            return Ok(true);
        }
        on_terminal(move |theme| {
            Confirm::with_theme(theme)
                .with_prompt(prompt)
                .default(false)
                .interact()
                .map_err(|e| prompt_error(&e))
        })
        .await
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn credentials(&mut self) -> Result<Credentials, MailerError> {
        report::step(1, "CONNECT TO YOUR MAIL SERVER");

        let username = match self.answers.username.take() {
            Some(username) => username,
            None => input("Email address").await?,
        };

        let password = match self.answers.password.take() {
            Some(password) => password,
            None => {
                println!("{TIP}Use an app password (16 characters for Gmail), not your account password");
                println!("{TIP}Your typing will be hidden");
                on_terminal(|theme| {
                    Password::with_theme(theme)
                        .with_prompt("App password")
                        .interact()
                        .map_err(|e| prompt_error(&e))
                })
                .await?
            }
        };

        println!("\n{}", style("Connecting...").dim());
        Ok(Credentials::new(username, password))
    }

    fn connected(&mut self, sender: &Mailbox) {
        println!("{SUCCESS}{}", style("Connected").green().bold());
        println!("   Logged in as: {}", style(sender).cyan());
    }

    async fn csv_path(&mut self) -> Result<PathBuf, MailerError> {
        report::step(2, "LOAD EMAIL LIST");

        if let Some(path) = self.answers.csv.take() {
            return Ok(path);
        }

        println!("{TIP}The CSV needs a column named 'email' or 'emails'");
        let raw = input("CSV file path").await?;
        Ok(PathBuf::from(attachments::clean_path(&raw)))
    }

    async fn confirm_recipients(&mut self, list: &[String]) -> Result<bool, MailerError> {
        println!(
            "{SUCCESS}Found {} valid email addresses\n",
            style(list.len()).bold()
        );
        println!("Preview of email list:");
        let (shown, remaining) = recipients::preview(list, PREVIEW_LIMIT);
        for (i, address) in shown.iter().enumerate() {
            println!("   {}. {address}", i + 1);
        }
        if remaining > 0 {
            println!("   ... and {remaining} more");
        }
        println!();

        self.confirm(format!("Proceed to send emails to {} recipients?", list.len()))
            .await
    }

    async fn draft(&mut self) -> Result<MessageDraft, MailerError> {
        report::step(3, "COMPOSE YOUR EMAIL");

        let sender_name = match self.answers.sender_name.take() {
            Some(name) => name,
            None if self.answers.assume_yes => String::new(),
            None => optional_input("Your name (optional, Enter to skip)".to_string()).await?,
        };

        let subject = match self.answers.subject.take() {
            Some(subject) => subject,
            None => input("Subject").await?,
        };

        let body = match self.answers.body.take() {
            Some(body) => body,
            None => {
                println!("\nEmail body:");
                println!("{TIP}Press Enter for new lines");
                println!("{TIP}Type '{BODY_SENTINEL}' on a line of its own when finished\n");
                on_terminal(|_| {
                    read_until_sentinel(io::stdin().lock())
                        .map_err(|e| MailerError::prompt(e.to_string()))
                })
                .await?
            }
        };

        let mut draft = MessageDraft::new(subject, body).sender_name(sender_name);
        if let Some(html) = self.answers.html.take() {
            draft = draft.html(html);
        }
        Ok(draft)
    }

    async fn attachment_paths(
        &mut self,
        limits: &AttachmentLimits,
    ) -> Result<Vec<String>, MailerError> {
        report::step(4, "ATTACHMENTS");

        if let Some(paths) = self.answers.attachments.take() {
            return Ok(paths);
        }
        if self.answers.assume_yes {
            return Ok(Vec::new());
        }

        println!("{}", attachment_tip(limits));
        println!("{TIP}Separate paths with commas; press Enter for none");
        let raw = optional_input("Attachment paths".to_string()).await?;
        Ok(attachments::parse_list(&raw))
    }

    async fn attachment_failed(
        &mut self,
        error: &AttachmentError,
    ) -> Result<AttachmentDecision, MailerError> {
        println!("{FAILURE}{}", style(error).red());

        if self.answers.assume_yes {
            return Ok(AttachmentDecision::Abort);
        }

        let choice = on_terminal(|theme| {
            Select::with_theme(theme)
                .with_prompt("What now?")
                .items(&[
                    "Enter the attachment paths again",
                    "Continue without attachments",
                    "Abort",
                ])
                .default(0)
                .interact()
                .map_err(|e| prompt_error(&e))
        })
        .await?;

        Ok(match choice {
            0 => AttachmentDecision::Retry,
            1 => AttachmentDecision::ContinueWithout,
            _ => AttachmentDecision::Abort,
        })
    }

    async fn delay(&mut self, default: Duration) -> Result<Duration, MailerError> {
        report::step(5, "SEND");

        if let Some(secs) = self.answers.delay.take() {
            return Ok(Duration::from_secs(secs));
        }
        if self.answers.assume_yes {
            return Ok(default);
        }

        println!("{TIP}Recommended: 2-3 seconds between emails");
        let raw = optional_input(format!(
            "Delay in seconds (Enter for {})",
            default.as_secs()
        ))
        .await?;
        Ok(parse_delay(&raw, default))
    }

    async fn confirm_send(
        &mut self,
        campaign: &Campaign,
        sender: &Mailbox,
    ) -> Result<bool, MailerError> {
        report::campaign(campaign, sender);
        self.confirm("Start sending?".to_string()).await
    }

    fn sending_started(&mut self, total: usize) {
        let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
        if let Ok(progress_style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(progress_style.progress_chars("=> "));
        }
        self.progress = Some(bar);
    }

    fn progress(&mut self, event: SendProgress<'_>) {
        let line = match event.outcome {
            SendOutcome::Sent => format!(
                "{SUCCESS}[{}/{}] Sent to: {}",
                event.index, event.total, event.address
            ),
            SendOutcome::Failed(reason) => format!(
                "{FAILURE}[{}/{}] Failed to send to {}: {}",
                event.index,
                event.total,
                event.address,
                style(reason).red()
            ),
        };

        match &self.progress {
            Some(bar) => {
                bar.println(line);
                bar.set_message(event.address.to_string());
                bar.inc(1);
                if event.index == event.total {
                    bar.finish_and_clear();
                }
            }
            None => println!("{line}"),
        }
    }

    fn notice(&mut self, message: &str) {
        println!("{WARNING}{}", style(message).yellow());
    }
}

/// Run a blocking terminal read on the blocking pool
///
/// If the awaiting task is dropped the read keeps the terminal until it
/// returns; [`terminal_busy`] reports that.
async fn on_terminal<T, F>(read: F) -> Result<T, MailerError>
where
    F: FnOnce(&ColorfulTheme) -> Result<T, MailerError> + Send + 'static,
    T: Send + 'static,
{
    READING_TERMINAL.store(true, Ordering::SeqCst);
    tokio::task::spawn_blocking(move || {
        let answer = read(&ColorfulTheme::default());
        READING_TERMINAL.store(false, Ordering::SeqCst);
        answer
    })
    .await
    .map_err(|e| MailerError::prompt(e.to_string()))?
}

/// Whether an abandoned prompt is still waiting for terminal input
#[must_use]
pub fn terminal_busy() -> bool {
    READING_TERMINAL.load(Ordering::SeqCst)
}

async fn input(prompt: &'static str) -> Result<String, MailerError> {
    on_terminal(move |theme| {
        Input::<String>::with_theme(theme)
            .with_prompt(prompt)
            .interact_text()
            .map(|s| s.trim().to_string())
            .map_err(|e| prompt_error(&e))
    })
    .await
}

async fn optional_input(prompt: String) -> Result<String, MailerError> {
    on_terminal(move |theme| {
        Input::<String>::with_theme(theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map(|s| s.trim().to_string())
            .map_err(|e| prompt_error(&e))
    })
    .await
}

fn attachment_tip(limits: &AttachmentLimits) -> String {
    format!(
        "{TIP}Up to {} files, {} each, {} in total",
        limits.max_files,
        human_size(limits.max_file_bytes),
        human_size(limits.max_total_bytes)
    )
}

/// Read lines until one equals [`BODY_SENTINEL`] (any case) or input ends
pub fn read_until_sentinel<R: BufRead>(reader: R) -> io::Result<String> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().eq_ignore_ascii_case(BODY_SENTINEL) {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Whole seconds, or `default` for anything else
pub fn parse_delay(raw: &str, default: Duration) -> Duration {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        raw.parse().map_or(default, Duration::from_secs)
    } else {
        default
    }
}

/// Wait for Enter, or a second Ctrl-C
///
/// Skipped when an interrupted prompt still holds the terminal, since that
/// read would swallow the keypress.
pub async fn wait_for_enter() {
    if terminal_busy() {
        return;
    }

    print!("\nPress Enter to exit...");
    let _ = io::stdout().flush();

    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
    });
    tokio::select! {
        _ = read => {}
        _ = tokio::signal::ctrl_c() => println!(),
    }
}

fn prompt_error(err: &dialoguer::Error) -> MailerError {
    match err {
        // raw-mode prompts see Ctrl-C as a key, not a signal
        dialoguer::Error::IO(e) if e.kind() == io::ErrorKind::Interrupted => {
            MailerError::Interrupted
        }
        _ => MailerError::prompt(err.to_string()),
    }
}
