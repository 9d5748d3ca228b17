//! bulk-mailer CLI tool

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

mod prompt;
mod report;

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use bulk_mailer::config::MailerConfig;
use bulk_mailer::email::{attachments, ConsoleConnector, SmtpConnector};
use bulk_mailer::observability::{self, LogFormat, ObservabilityConfig};
use bulk_mailer::workflow::{self, RunOutcome};
use clap::Parser;
use tokio::sync::oneshot;

use prompt::{Answers, TerminalOperator};

/// Environment variable holding the app password
const PASSWORD_ENV: &str = "BULK_MAILER_PASSWORD";

/// How long an abandoned terminal read may delay exit
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = "bulk-mailer")]
#[command(version)]
#[command(about = "Send one email campaign to every address in a CSV file", long_about = None)]
struct Cli {
    /// Login name for the relay, usually your full email address
    ///
    /// The app password is never taken from the command line; set
    /// BULK_MAILER_PASSWORD or type it when asked.
    #[arg(long, short = 'u', value_name = "EMAIL", env = "BULK_MAILER_USERNAME")]
    username: Option<String>,

    /// CSV file with an `email` column
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Display name shown in the From header
    #[arg(long, value_name = "NAME")]
    sender_name: Option<String>,

    /// Subject line
    #[arg(long)]
    subject: Option<String>,

    /// Read the plain text body from a file
    #[arg(long, value_name = "FILE")]
    body_file: Option<PathBuf>,

    /// Read an HTML alternative from a file
    #[arg(long, value_name = "FILE")]
    html_file: Option<PathBuf>,

    /// Attach a file (repeatable, comma-separated lists accepted)
    #[arg(long = "attach", value_name = "FILE")]
    attachments: Vec<String>,

    /// Seconds to wait between two emails
    #[arg(long, value_name = "SECONDS")]
    delay: Option<u64>,

    /// Answer yes to both confirmations and skip optional questions
    #[arg(long, short = 'y')]
    yes: bool,

    /// Log every message instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Extra configuration file, merged over the default locations
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exit without waiting for Enter
    #[arg(long)]
    no_pause: bool,

    /// More log output (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: pretty, compact or json
    #[arg(long, value_name = "FORMAT", default_value = "compact")]
    log_format: LogFormat,
}

impl Cli {
    fn answers(&self) -> Result<Answers> {
        let body = self
            .body_file
            .as_deref()
            .map(|path| {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read body file: {}", path.display()))
            })
            .transpose()?;

        let html = self
            .html_file
            .as_deref()
            .map(|path| {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read HTML file: {}", path.display()))
            })
            .transpose()?;

        let attachments = (!self.attachments.is_empty()).then(|| {
            self.attachments
                .iter()
                .flat_map(|raw| attachments::parse_list(raw))
                .collect()
        });

        Ok(Answers {
            username: self.username.clone(),
            password: std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty()),
            csv: self.csv.clone(),
            sender_name: self.sender_name.clone(),
            subject: self.subject.clone(),
            body,
            html,
            attachments,
            delay: self.delay,
            assume_yes: self.yes,
        })
    }

    fn observability(&self) -> ObservabilityConfig {
        // dry-run output is the log itself
        let verbosity = if self.dry_run { self.verbose.max(1) } else { self.verbose };
        ObservabilityConfig::new(verbosity, self.log_format)
    }
}

/// Resolves on the first Ctrl-C
///
/// The listener is spawned right away so the signal is caught from the first
/// prompt on, not only once the returned future is polled.
fn interrupt_signal() -> impl Future<Output = ()> + Send {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });
    async move {
        if rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn execute(cli: &Cli, interrupt: impl Future<Output = ()> + Send) -> Result<RunOutcome> {
    let config = MailerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let mut operator = TerminalOperator::new(cli.answers()?);

    let outcome = if cli.dry_run {
        let connector = ConsoleConnector::new().from_address(config.smtp.from_address.clone());
        workflow::run(&connector, &mut operator, &config, interrupt).await
    } else {
        let connector = SmtpConnector::new(config.smtp.clone());
        workflow::run(&connector, &mut operator, &config, interrupt).await
    };

    operator.finish_progress();
    outcome.map_err(anyhow::Error::from)
}

async fn session(cli: &Cli) -> ExitCode {
    let interrupt = interrupt_signal();
    report::banner();

    let code = match execute(cli, interrupt).await {
        Ok(outcome) => {
            report::outcome(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run failed");
            report::error(&e);
            ExitCode::FAILURE
        }
    };

    report::closing();
    if !cli.no_pause {
        prompt::wait_for_enter().await;
    }
    code
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = observability::init(&cli.observability()) {
        eprintln!("{e:#}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(session(&cli));
    // an interrupted prompt may still be blocked on stdin
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}
