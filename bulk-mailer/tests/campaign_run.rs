//! Integration tests for complete runs
//!
//! Drives `workflow::run` end to end with the in-memory relay and a scripted
//! operator.

use std::future::pending;
use std::path::PathBuf;
use std::time::Duration;

use bulk_mailer::config::MailerConfig;
use bulk_mailer::email::{ConsoleConnector, MessageDraft};
use bulk_mailer::testing::{RecordingConnector, ScriptedOperator};
use bulk_mailer::workflow::{self, AttachmentDecision, RunOutcome};
use bulk_mailer::MailerError;
use tempfile::TempDir;

/// Helper to write a recipient file
fn contacts(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("contacts.csv");
    std::fs::write(&path, body).unwrap();
    path
}

fn config_without_delay() -> MailerConfig {
    let mut config = MailerConfig::default();
    config.sending.delay_secs = 0;
    config
}

#[tokio::test]
async fn test_failed_recipients_are_reported_in_order() {
    let dir = TempDir::new().unwrap();
    let path = contacts(
        &dir,
        "Name,E-mail\nOne,r1@example.com\nTwo,r2@example.com\nThree,r3@example.com\nFour,r4@example.com\n",
    );
    let connector = RecordingConnector::new().failing_for(["r2@example.com", "r4@example.com"]);
    let mut operator = ScriptedOperator::new(&path);

    let outcome = workflow::run(&connector, &mut operator, &config_without_delay(), pending())
        .await
        .unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run, got {outcome:?}");
    };
    assert_eq!(summary.total(), 4);
    assert_eq!(summary.sent(), 2);
    assert_eq!(
        summary.failed_addresses().collect::<Vec<_>>(),
        vec!["r2@example.com", "r4@example.com"]
    );
    assert_eq!(connector.recipients(), vec!["r1@example.com", "r3@example.com"]);
    assert_eq!(connector.disconnects(), 1);
}

#[tokio::test]
async fn test_attachments_reach_every_message() {
    let dir = TempDir::new().unwrap();
    let path = contacts(&dir, "email\na@example.com\nb@example.com\n");
    let brochure = dir.path().join("brochure.pdf");
    std::fs::write(&brochure, vec![0_u8; 2048]).unwrap();

    let connector = RecordingConnector::new();
    let mut operator = ScriptedOperator::new(&path)
        .with_draft(MessageDraft::new("Brochure", "Please find it attached.").sender_name("Sales"))
        .attachments(vec![format!("\"{}\"", brochure.display())]);

    workflow::run(&connector, &mut operator, &config_without_delay(), pending())
        .await
        .unwrap();

    let messages = connector.messages();
    assert_eq!(messages.len(), 2);
    for (raw, recipient) in messages.iter().zip(["a@example.com", "b@example.com"]) {
        assert!(raw.contains("filename=\"brochure.pdf\""));
        assert!(raw.contains("application/octet-stream"));
        assert!(raw.contains("Sales"));
        assert!(raw.contains(&format!("To: {recipient}")));
    }
    // neither recipient sees the other
    assert!(!messages[0].contains("b@example.com"));
    assert!(!messages[1].contains("a@example.com"));
}

#[tokio::test]
async fn test_oversized_batch_then_retry_without_files() {
    let dir = TempDir::new().unwrap();
    let path = contacts(&dir, "email\na@example.com\n");
    let files: Vec<String> = ["a.bin", "b.bin", "c.bin"]
        .iter()
        .map(|name| {
            let file = dir.path().join(name);
            std::fs::File::create(&file)
                .unwrap()
                .set_len(10 * 1024 * 1024)
                .unwrap();
            file.to_string_lossy().into_owned()
        })
        .collect();

    let connector = RecordingConnector::new();
    let mut operator = ScriptedOperator::new(&path)
        .attachments(files)
        .on_attachment_failure(AttachmentDecision::Retry);

    let outcome = workflow::run(&connector, &mut operator, &config_without_delay(), pending())
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(operator.attachment_failures(), 1);
    assert!(!connector.messages()[0].contains("a.bin"));
}

#[tokio::test]
async fn test_missing_csv_is_fatal_and_disconnects() {
    let dir = TempDir::new().unwrap();
    let connector = RecordingConnector::new();
    let mut operator = ScriptedOperator::new(dir.path().join("absent.csv"));

    let err = workflow::run(&connector, &mut operator, &config_without_delay(), pending())
        .await
        .unwrap_err();

    assert!(matches!(err, MailerError::FileNotFound(_)));
    assert_eq!(connector.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_waits_between_sends_only() {
    let dir = TempDir::new().unwrap();
    let path = contacts(&dir, "email\na@x.com\nb@x.com\nc@x.com\nd@x.com\n");
    let connector = RecordingConnector::new();
    let mut operator = ScriptedOperator::new(&path).delay_answer(Duration::from_secs(3));

    let start = tokio::time::Instant::now();
    workflow::run(&connector, &mut operator, &MailerConfig::default(), pending())
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_secs(9));
    assert_eq!(connector.sent_count(), 4);
}

#[tokio::test]
async fn test_dry_run_with_console_backend() {
    let dir = TempDir::new().unwrap();
    let path = contacts(&dir, "emails\none@example.com\ntwo@example.com\n");
    let connector = ConsoleConnector::new();
    let mut operator = ScriptedOperator::new(&path).login("me@example.com", "");

    let outcome = workflow::run(&connector, &mut operator, &config_without_delay(), pending())
        .await
        .unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run, got {outcome:?}");
    };
    assert!(summary.is_complete_success());
    assert_eq!(summary.sent(), 2);
}
