//! Attachment validation
//!
//! Attachments are checked as a batch before the first message is sent. Any
//! violation rejects the entire batch so a campaign never goes out with a
//! silently shortened attachment list.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AttachmentError;

/// Maximum number of attachments per message
pub const MAX_ATTACHMENTS: usize = 5;

/// Per-file and aggregate attachment ceiling (25 MiB, Gmail-class relays)
pub const MAX_ATTACHMENT_BYTES: u64 = 25 * 1024 * 1024;

/// Attachment ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentLimits {
    /// Maximum number of files
    pub max_files: usize,

    /// Maximum size of one file in bytes
    pub max_file_bytes: u64,

    /// Maximum size of all files together in bytes
    pub max_total_bytes: u64,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_files: MAX_ATTACHMENTS,
            max_file_bytes: MAX_ATTACHMENT_BYTES,
            max_total_bytes: MAX_ATTACHMENT_BYTES,
        }
    }
}

/// A validated attachment on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    path: PathBuf,
    filename: String,
    size: u64,
}

impl AttachmentRef {
    /// Path the attachment is read from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name announced in `Content-Disposition`
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size in bytes at validation time
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Read the attachment's bytes
    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// Strip surrounding whitespace and quote characters from an operator-typed path
///
/// Paths copied from a file manager often arrive as `"C:\My Files\a.pdf"`.
#[must_use]
pub fn clean_path(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

/// Split a comma-separated list of paths, dropping empty entries
///
/// # Examples
///
/// ```rust
/// use bulk_mailer::email::attachments::parse_list;
///
/// assert_eq!(parse_list(" a.pdf, 'b c.txt' ,,"), vec!["a.pdf", "b c.txt"]);
/// ```
#[must_use]
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(clean_path)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Format a byte count the way limits are shown to the operator
///
/// Whole mebibytes print as `N MB`, anything else as a byte count.
#[must_use]
pub fn human_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Validate a set of attachment paths
///
/// Returns the attachments in input order. Empty input yields an empty list.
///
/// # Errors
///
/// Returns the first violation found: too many files, a missing path, a
/// non-regular file, a file over the per-file ceiling or a running total over
/// the aggregate ceiling. No partial list is returned.
pub fn validate<I, S>(paths: I, limits: &AttachmentLimits) -> Result<Vec<AttachmentRef>, AttachmentError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let paths: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| clean_path(p.as_ref()).to_string())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect();

    if paths.len() > limits.max_files {
        return Err(AttachmentError::TooMany {
            count: paths.len(),
            limit: limits.max_files,
        });
    }

    let mut total: u64 = 0;
    let mut validated = Vec::with_capacity(paths.len());

    for path in paths {
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AttachmentError::NotFound(path));
            }
            Err(source) => return Err(AttachmentError::Io { path, source }),
        };

        if !metadata.is_file() {
            return Err(AttachmentError::NotAFile(path));
        }

        let size = metadata.len();
        if size > limits.max_file_bytes {
            return Err(AttachmentError::FileTooLarge {
                path,
                size,
                limit: limits.max_file_bytes,
            });
        }

        total = total.saturating_add(size);
        if total > limits.max_total_bytes {
            return Err(AttachmentError::TotalTooLarge {
                total,
                limit: limits.max_total_bytes,
            });
        }

        let filename = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        debug!(path = %path.display(), size, total, "attachment accepted");
        validated.push(AttachmentRef { path, filename, size });
    }

    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(MAX_ATTACHMENT_BYTES), "25 MB");
        assert_eq!(human_size(1500), "1500 bytes");
        assert_eq!(human_size(MIB + 1), format!("{} bytes", MIB + 1));
    }

    fn sized_file(dir: &TempDir, name: &str, size: u64) -> String {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        file.set_len(size).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_empty_input_is_empty_output() {
        let result = validate(Vec::<String>::new(), &AttachmentLimits::default()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_valid_files_in_order() {
        let dir = TempDir::new().unwrap();
        let a = sized_file(&dir, "report.pdf", 1024);
        let b = sized_file(&dir, "photo.jpg", 2048);

        let result = validate([&a, &b], &AttachmentLimits::default()).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].filename(), "report.pdf");
        assert_eq!(result[0].size(), 1024);
        assert_eq!(result[1].filename(), "photo.jpg");
    }

    #[test]
    fn test_aggregate_ceiling_rejects_batch() {
        let dir = TempDir::new().unwrap();
        let files = [
            sized_file(&dir, "a.bin", 10 * MIB),
            sized_file(&dir, "b.bin", 10 * MIB),
            sized_file(&dir, "c.bin", 10 * MIB),
        ];

        let err = validate(&files, &AttachmentLimits::default()).unwrap_err();

        assert!(matches!(
            err,
            AttachmentError::TotalTooLarge { total, limit }
                if total == 30 * MIB && limit == MAX_ATTACHMENT_BYTES
        ));
    }

    #[test]
    fn test_single_oversized_file_rejected() {
        let dir = TempDir::new().unwrap();
        let big = sized_file(&dir, "big.iso", 26 * MIB);

        let err = validate([&big], &AttachmentLimits::default()).unwrap_err();

        assert!(matches!(err, AttachmentError::FileTooLarge { size, .. } if size == 26 * MIB));
    }

    #[test]
    fn test_exactly_at_ceiling_is_accepted() {
        let dir = TempDir::new().unwrap();
        let edge = sized_file(&dir, "edge.bin", MAX_ATTACHMENT_BYTES);

        let result = validate([&edge], &AttachmentLimits::default()).unwrap();
        assert_eq!(result[0].size(), MAX_ATTACHMENT_BYTES);
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = TempDir::new().unwrap();
        let ok = sized_file(&dir, "ok.txt", 10);
        let missing = dir.path().join("missing.txt").to_string_lossy().into_owned();

        let err = validate([&ok, &missing], &AttachmentLimits::default()).unwrap_err();
        assert!(matches!(err, AttachmentError::NotFound(p) if p.ends_with("missing.txt")));
    }

    #[test]
    fn test_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().into_owned();

        let err = validate([&path], &AttachmentLimits::default()).unwrap_err();
        assert!(matches!(err, AttachmentError::NotAFile(_)));
    }

    #[test]
    fn test_quotes_and_whitespace_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = sized_file(&dir, "quoted.txt", 5);
        let quoted = format!("  \"{path}\"  ");

        let result = validate([quoted], &AttachmentLimits::default()).unwrap();
        assert_eq!(result[0].filename(), "quoted.txt");
    }

    #[test]
    fn test_too_many_files_rejected() {
        let dir = TempDir::new().unwrap();
        let files: Vec<String> = (0..6)
            .map(|i| sized_file(&dir, &format!("f{i}.txt"), 1))
            .collect();

        let err = validate(&files, &AttachmentLimits::default()).unwrap_err();
        assert!(matches!(err, AttachmentError::TooMany { count: 6, limit: 5 }));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("a.pdf, \"My Docs/b.txt\" , 'c.png',  "),
            vec!["a.pdf", "My Docs/b.txt", "c.png"]
        );
        assert!(parse_list("  ").is_empty());
    }

    #[test]
    fn test_read_returns_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        fs::write(&path, b"hello").unwrap();

        let result = validate([path.to_string_lossy()], &AttachmentLimits::default()).unwrap();
        assert_eq!(result[0].read().unwrap(), b"hello");
    }
}
