//! Terminal output: banner, step headers and the final report

use bulk_mailer::email::{Campaign, Mailbox, SendSummary};
use bulk_mailer::workflow::RunOutcome;
use bulk_mailer::MailerError;
use chrono::{DateTime, Local};
use console::{style, Emoji};

static MAIL: Emoji<'_, '_> = Emoji("📧 ", "");
static SUCCESS: Emoji<'_, '_> = Emoji("✓ ", "√ ");
static ERROR: Emoji<'_, '_> = Emoji("✗ ", "x ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
static TIP: Emoji<'_, '_> = Emoji("💡 ", "* ");

const RULE_WIDTH: usize = 60;

/// Print the welcome banner
pub fn banner() {
    println!();
    println!("{}", style("═".repeat(RULE_WIDTH)).cyan());
    println!(
        "  {MAIL}{}",
        style("BULK MAILER - one campaign, every address in a CSV").bold()
    );
    println!("{}", style("═".repeat(RULE_WIDTH)).cyan());
}

/// Print a numbered step header
pub fn step(number: u8, title: &str) {
    println!();
    println!("{}", style(format!("STEP {number}: {title}")).bold());
    println!("{}", style("-".repeat(RULE_WIDTH)).dim());
}

/// Print the campaign about to be sent
pub fn campaign(campaign: &Campaign, sender: &Mailbox) {
    let from = campaign
        .sender_name()
        .map_or_else(|| sender.email.to_string(), str::to_string);

    println!();
    println!("{}", style("READY TO SEND:").bold());
    println!("   From:        {from}");
    println!("   To:          {} recipients", campaign.recipients().len());
    println!("   Subject:     {}", campaign.subject());
    if !campaign.attachments().is_empty() {
        let names: Vec<&str> = campaign.attachments().iter().map(|a| a.filename()).collect();
        println!("   Attachments: {}", names.join(", "));
    }
    println!("   Delay:       {} seconds between emails", campaign.delay().as_secs());
    println!();
}

/// Print how the run ended
pub fn outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(summary) => {
            println!();
            println!("{}", style("=".repeat(RULE_WIDTH)).dim());
            for line in summary_lines(summary) {
                println!("{line}");
            }
            println!();
            println!("{SUCCESS}{}", style("Process completed!").green().bold());
            println!("Finished at: {}", finished_at(summary.finished_at()));
            println!("{TIP}Check your mailbox's Sent folder to verify the emails went out");
        }
        RunOutcome::Cancelled => {
            println!("\n{ERROR}{}", style("Operation cancelled.").yellow());
        }
        RunOutcome::NoRecipients => {
            println!(
                "\n{WARNING}{}",
                style("No valid emails found. Please check your CSV file.").yellow()
            );
        }
        RunOutcome::Interrupted { attempted: 0 } => {
            println!("\n{WARNING}{}", style("Process interrupted before sending.").yellow());
        }
        RunOutcome::Interrupted { attempted } => {
            println!(
                "\n{WARNING}{}",
                style(format!("Process interrupted after {attempted} emails")).yellow()
            );
        }
    }
}

/// Print a fatal error with its hint, if it has one
pub fn error(err: &anyhow::Error) {
    println!("\n{ERROR}{}", style(format!("{err:#}")).red().bold());
    if let Some(hint) = err.downcast_ref::<MailerError>().and_then(MailerError::hint) {
        println!("{TIP}{hint}");
    }
}

/// Print the closing message shown on every exit path
pub fn closing() {
    println!("\n{}", style("Thank you for using bulk-mailer!").bold());
}

/// Summary lines without styling
pub fn summary_lines(summary: &SendSummary) -> Vec<String> {
    let mut lines = vec![
        "SUMMARY".to_string(),
        format!("Successfully sent: {}/{}", summary.sent(), summary.total()),
        format!("Failed: {}/{}", summary.failed_count(), summary.total()),
    ];

    if summary.failed_count() > 0 {
        lines.push(String::new());
        lines.push("Failed email addresses:".to_string());
        lines.extend(
            summary
                .failed()
                .iter()
                .map(|f| format!("   - {} ({})", f.address, f.reason)),
        );
    }
    lines
}

fn finished_at(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
