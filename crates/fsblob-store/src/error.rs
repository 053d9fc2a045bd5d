use std::path::PathBuf;

use fsblob_types::{BlobDescriptor, BlobKey, BlobName, TypeError};

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The descriptor does not resolve to a committed blob.
    #[error("blob not found: {0}")]
    NotFound(BlobDescriptor),

    /// The descriptor or write request is malformed.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(#[from] TypeError),

    /// The written content did not hash to the key the caller expected.
    #[error("key mismatch for {name}: expected {expected}, computed {computed}")]
    KeyMismatch {
        name: BlobName,
        expected: BlobKey,
        computed: BlobKey,
    },

    /// The write exceeded the configured size limit.
    #[error("blob {name} exceeds the {limit}-byte limit")]
    TooLarge { name: BlobName, limit: u64 },

    /// A name record on disk could not be decoded.
    #[error("corrupt name record {name}: {reason}")]
    CorruptRecord { name: BlobName, reason: String },

    /// The store root does not exist or is not a directory.
    #[error("store root is not a directory: {}", .0.display())]
    RootMissing(PathBuf),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking helper task failed to complete.
    #[error("background task failed: {0}")]
    Background(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns `true` when the target blob simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for malformed requests.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidDescriptor(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
