//! Recipient list loading
//!
//! Recipients come from the first CSV column whose header is one of
//! [`EMAIL_COLUMNS`] (case-insensitive). Rows without a plausible address are
//! skipped rather than reported; one bad row never blocks a campaign.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::error::MailerError;

/// Header names accepted for the email column, compared lowercased
pub const EMAIL_COLUMNS: [&str; 4] = ["email", "emails", "e-mail", "e-mails"];

/// Load recipient addresses from a CSV file
///
/// Returns the addresses in file order, duplicates included. An empty list
/// is a valid result; deciding what to do about it is up to the caller.
///
/// # Errors
///
/// - [`MailerError::FileNotFound`] if `path` does not exist
/// - [`MailerError::NoEmailColumn`] if no header matches [`EMAIL_COLUMNS`]
/// - [`MailerError::Csv`] if the file is not valid UTF-8 CSV
///
/// # Examples
///
/// ```rust,no_run
/// use bulk_mailer::email::recipients;
///
/// # fn example() -> Result<(), bulk_mailer::MailerError> {
/// let addresses = recipients::load("contacts.csv")?;
/// for address in &addresses {
///     println!("{address}");
/// }
/// # Ok(())
/// # }
/// ```
pub fn load(path: impl AsRef<Path>) -> Result<Vec<String>, MailerError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => MailerError::FileNotFound(path.to_path_buf()),
        _ => MailerError::Io(e),
    })?;

    let addresses = load_from_reader(file)?;
    info!(path = %path.display(), count = addresses.len(), "loaded recipients");
    Ok(addresses)
}

/// Load recipient addresses from any CSV source
///
/// # Errors
///
/// Same as [`load`], minus the file lookup.
pub fn load_from_reader<R: Read>(reader: R) -> Result<Vec<String>, MailerError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let column = find_email_column(&headers).ok_or_else(|| MailerError::NoEmailColumn {
        columns: headers.iter().map(str::to_string).collect(),
    })?;

    let mut addresses = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let value = record.get(column).unwrap_or_default().trim();
        if is_plausible_address(value) {
            addresses.push(value.to_string());
        } else {
            // header is line 1
            debug!(line = index + 2, "skipping row without a usable address");
        }
    }

    Ok(addresses)
}

/// Index of the first header naming an email column
#[must_use]
pub fn find_email_column(headers: &StringRecord) -> Option<usize> {
    headers.iter().position(|name| {
        let name = name.trim_start_matches('\u{feff}').trim().to_lowercase();
        EMAIL_COLUMNS.contains(&name.as_str())
    })
}

/// Minimal address check: non-empty and contains `@`
#[must_use]
pub fn is_plausible_address(value: &str) -> bool {
    !value.is_empty() && value.contains('@')
}

/// First `limit` addresses plus the number left out
#[must_use]
pub fn preview(addresses: &[String], limit: usize) -> (&[String], usize) {
    let shown = addresses.len().min(limit);
    (&addresses[..shown], addresses.len() - shown)
}
