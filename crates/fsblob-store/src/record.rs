//! Name records: the small JSON files under `names/` that bind a name to the
//! key and size of its committed content.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fsblob_types::{BlobKey, BlobName};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::layout::StoreLayout;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NameRecord {
    pub key: BlobKey,
    pub size: u64,
}

/// Load the record for `name`, or `None` if the name was never committed.
pub(crate) async fn load(layout: &StoreLayout, name: &BlobName) -> StoreResult<Option<NameRecord>> {
    let bytes = match tokio::fs::read(layout.name_path(name)).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::CorruptRecord {
            name: name.clone(),
            reason: e.to_string(),
        })
}

/// A name record written and flushed to `tmp/`, waiting for the rename that
/// makes it visible. Dropping it removes the temporary file.
pub(crate) struct StagedRecord {
    tmp: NamedTempFile,
    path: PathBuf,
}

/// Write the record for `name` to a temporary file and create the
/// directories its final path needs. Every fallible step of publishing
/// except the rename happens here. Blocking; call from a blocking task.
pub(crate) fn stage_blocking(
    layout: &StoreLayout,
    sync_mode: SyncMode,
    name: &BlobName,
    record: &NameRecord,
) -> StoreResult<StagedRecord> {
    let path = layout.name_path(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp = tempfile::Builder::new()
        .prefix("ref-")
        .tempfile_in(layout.temp_dir())?;
    serde_json::to_writer(&mut tmp, record).map_err(io::Error::from)?;
    tmp.flush()?;
    if sync_mode == SyncMode::EveryBlob {
        tmp.as_file().sync_all()?;
    }
    Ok(StagedRecord { tmp, path })
}

impl StagedRecord {
    /// Rename the record over its final path. This is the commit point: once
    /// the rename succeeds the write is committed, so a failed directory sync
    /// afterwards is only logged.
    pub(crate) fn commit(self, sync_mode: SyncMode) -> StoreResult<()> {
        self.tmp
            .persist(&self.path)
            .map_err(|e| StoreError::Io(e.error))?;
        if sync_mode == SyncMode::EveryBlob {
            if let Err(e) = sync_parent(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to sync name directory");
            }
        }
        Ok(())
    }
}

/// Flush the directory entry of `path` so a completed rename survives a crash.
#[cfg(unix)]
pub(crate) fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => std::fs::File::open(parent)?.sync_all(),
        None => Ok(()),
    }
}

/// Directory handles cannot be synced here; renames rely on the OS.
#[cfg(not(unix))]
pub(crate) fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}
