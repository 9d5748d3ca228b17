//! Attachment validation errors

use std::path::PathBuf;

use thiserror::Error;

/// Reasons an attachment set is rejected
///
/// Validation is all-or-nothing: the first of these aborts the whole batch.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// The path does not exist
    #[error("attachment not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but is a directory, socket or similar
    #[error("attachment is not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    /// A single file exceeds the per-file ceiling
    #[error("attachment {} is {size} bytes, more than the {limit} byte limit", .path.display())]
    FileTooLarge {
        /// Offending file
        path: PathBuf,
        /// Its size in bytes
        size: u64,
        /// Per-file ceiling in bytes
        limit: u64,
    },

    /// The files together exceed the aggregate ceiling
    #[error("attachments total {total} bytes, more than the {limit} byte limit")]
    TotalTooLarge {
        /// Running total when the ceiling was crossed
        total: u64,
        /// Aggregate ceiling in bytes
        limit: u64,
    },

    /// More files than a single message may carry
    #[error("{count} attachments given, at most {limit} are allowed")]
    TooMany {
        /// Number of files given
        count: usize,
        /// Maximum number of files
        limit: usize,
    },

    /// File metadata could not be read
    #[error("cannot inspect attachment {}: {source}", .path.display())]
    Io {
        /// File being inspected
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}
