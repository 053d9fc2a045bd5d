use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Flush strategy applied before a blob is committed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// `fsync` every blob before it is renamed into place.
    #[default]
    EveryBlob,
    /// Rely on OS page-cache buffering (fastest, least durable).
    OsDefault,
}

/// Configuration for a [`FsBlobStore`](crate::FsBlobStore).
///
/// ```toml
/// root = "/var/lib/fsblob"
/// sync_mode = "every-blob"
/// shard_depth = 1
/// read_chunk_size = 65536
/// max_blob_size = 104857600
/// verify_reads = false
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory. Must already exist; the store never creates or
    /// removes it.
    pub root: PathBuf,
    /// Flush strategy.
    pub sync_mode: SyncMode,
    /// Number of two-hex-digit shard directories above each object.
    /// Changing it on an existing root hides previously written objects.
    pub shard_depth: u8,
    /// Chunk size used by read streams.
    pub read_chunk_size: usize,
    /// Optional upper bound on blob size in bytes.
    pub max_blob_size: Option<u64>,
    /// Re-hash content while reading and fail on mismatch.
    pub verify_reads: bool,
}

/// Deepest sharding accepted.
pub const MAX_SHARD_DEPTH: u8 = 4;

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            sync_mode: SyncMode::default(),
            shard_depth: 1,
            read_chunk_size: 64 * 1024,
            max_blob_size: None,
            verify_reads: false,
        }
    }
}

impl StoreConfig {
    /// Default configuration rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_max_blob_size(mut self, limit: u64) -> Self {
        self.max_blob_size = Some(limit);
        self
    }

    pub fn with_verify_reads(mut self, verify: bool) -> Self {
        self.verify_reads = verify;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject settings the store cannot honour.
    pub fn validate(&self) -> StoreResult<()> {
        if self.shard_depth > MAX_SHARD_DEPTH {
            return Err(StoreError::Config(format!(
                "shard_depth {} exceeds {MAX_SHARD_DEPTH}",
                self.shard_depth
            )));
        }
        if self.read_chunk_size == 0 {
            return Err(StoreError::Config("read_chunk_size must be positive".into()));
        }
        Ok(())
    }
}
