//! Error types for attachment operations

use std::path::PathBuf;
use thiserror::Error;

/// Attachment operation result type
pub type Result<T> = std::result::Result<T, StowError>;

/// Errors raised while reading, embedding or removing attachments
#[derive(Error, Debug)]
pub enum StowError {
    /// First boundary found, but the one closing the TOC is missing
    #[error("corrupt attachment data (incomplete TOC)")]
    IncompleteContainer,

    /// TOC bytes are not a valid table of contents
    #[error("corrupt attachment data (invalid TOC): {0}")]
    MalformedToc(#[source] serde_json::Error),

    /// Declared attachment sizes run past the end of the file
    #[error("corrupt attachment data (offsets too large)")]
    OffsetsExceedFile,

    /// Declared attachment sizes do not end on the trailing boundary
    #[error("corrupt attachment data (invalid offsets)")]
    OffsetsInvalid,

    /// Target executable lacks the compatibility marker
    #[error("incompatible (magic string not found)")]
    Incompatible,

    /// Target executable already carries a container
    #[error("already contains embedded content")]
    AlreadyEmbedded,

    /// Removal requested on an executable without a container
    #[error("contains no embedded data")]
    NothingEmbedded,

    /// Attachments handle was closed twice
    #[error("attachments already closed")]
    AlreadyClosed,

    /// Attachment stream yielded fewer bytes than its measured size
    #[error("attachment {name:?} changed while embedding: expected {expected} bytes, copied {actual}")]
    AttachmentSizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// Attachment file could not be opened
    #[error("open attachment {name:?} ({path:?}): {source}")]
    AttachmentSource {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Attachment list file is malformed or names unusable entries
    #[error("invalid attachment list: {0}")]
    InvalidAttachmentList(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
