//! Write pipeline.
//!
//! A [`BlobWriter`] streams bytes into a scoped temporary file under `tmp/`
//! while feeding them to a [`HashAccumulator`]. Nothing is visible to
//! readers until [`BlobWriter::finish`] commits:
//!
//! 1. the name record is staged in `tmp/` and its directories are created
//! 2. the temporary file is renamed to `objects/<shard>/<key>` (or discarded
//!    if identical content is already stored)
//! 3. the staged record is renamed into `names/`
//!
//! The record rename is the commit point. If it fails, an object created by
//! step 2 is removed again. Dropping or aborting the writer removes the
//! temporary files on every path.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use fsblob_crypto::HashAccumulator;
use fsblob_types::{BlobInfo, BlobKey, BlobName, WriteRequest};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::layout::StoreLayout;
use crate::record::{self, NameRecord};

/// First failure seen by the sink; replayed on every later call.
#[derive(Clone, Debug)]
enum WriteFailure {
    TooLarge { limit: u64 },
    Io { kind: io::ErrorKind, message: String },
}

impl WriteFailure {
    fn to_io(&self) -> io::Error {
        match self {
            Self::TooLarge { limit } => io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("blob exceeds the {limit}-byte limit"),
            ),
            Self::Io { kind, message } => io::Error::new(*kind, message.clone()),
        }
    }

    fn into_error(self, name: &BlobName) -> StoreError {
        match self {
            Self::TooLarge { limit } => StoreError::TooLarge {
                name: name.clone(),
                limit,
            },
            Self::Io { kind, message } => StoreError::Io(io::Error::new(kind, message)),
        }
    }
}

/// Streaming sink for one blob. Implements [`AsyncWrite`]; resolve it with
/// [`finish`](Self::finish) (commit) or [`abort`](Self::abort).
pub struct BlobWriter {
    request: WriteRequest,
    layout: Arc<StoreLayout>,
    sync_mode: SyncMode,
    max_blob_size: Option<u64>,
    file: Option<File>,
    temp_path: Option<TempPath>,
    hasher: HashAccumulator,
    failure: Option<WriteFailure>,
}

impl BlobWriter {
    /// Open a temporary artifact for `request`. Blocking file creation runs
    /// on the blocking pool.
    pub(crate) async fn create(
        request: WriteRequest,
        layout: Arc<StoreLayout>,
        sync_mode: SyncMode,
        max_blob_size: Option<u64>,
    ) -> StoreResult<Self> {
        let temp_dir = layout.temp_dir().to_path_buf();
        let temp = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix("blob-").tempfile_in(temp_dir)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))??;

        let (file, temp_path) = temp.into_parts();
        debug!(name = %request.name, temp = %temp_path.display(), "write started");

        Ok(Self {
            request,
            layout,
            sync_mode,
            max_blob_size,
            file: Some(File::from_std(file)),
            temp_path: Some(temp_path),
            hasher: HashAccumulator::new(),
            failure: None,
        })
    }

    /// The name this writer will commit under.
    pub fn name(&self) -> &BlobName {
        &self.request.name
    }

    /// Bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.hasher.bytes_hashed()
    }

    /// Commit the blob and report `{name, key, size}`.
    ///
    /// Consumes the writer, so a write resolves exactly once. On error the
    /// temporary artifact is removed and nothing becomes visible.
    pub async fn finish(mut self) -> StoreResult<BlobInfo> {
        if let Some(failure) = self.failure.take() {
            return Err(failure.into_error(&self.request.name));
        }

        let (mut file, temp_path) = match (self.file.take(), self.temp_path.take()) {
            (Some(file), Some(temp_path)) => (file, temp_path),
            _ => return Err(StoreError::Io(closed())),
        };

        file.flush().await?;
        let file = file.into_std().await;

        let hasher = std::mem::take(&mut self.hasher);
        let (key, size) = hasher.finalize();

        if let Some(expected) = &self.request.expected_key {
            if *expected != key {
                return Err(StoreError::KeyMismatch {
                    name: self.request.name.clone(),
                    expected: expected.clone(),
                    computed: key,
                });
            }
        }

        let layout = Arc::clone(&self.layout);
        let sync_mode = self.sync_mode;
        let name = self.request.name.clone();
        let info = tokio::task::spawn_blocking(move || {
            commit_blocking(&layout, sync_mode, file, temp_path, name, key, size)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))??;

        debug!(name = %info.name, key = %info.key.short_hex(), size = info.size, "write committed");
        Ok(info)
    }

    /// Discard the write. Equivalent to dropping the writer.
    pub fn abort(self) {
        debug!(name = %self.request.name, "write aborted");
    }

    /// Discard the write after `err` interrupted it, preferring the sink's
    /// own recorded failure (e.g. the size limit) over the surface error.
    pub(crate) fn abort_with(mut self, err: io::Error) -> StoreError {
        let error = match self.failure.take() {
            Some(failure) => failure.into_error(&self.request.name),
            None => StoreError::Io(err),
        };
        debug!(name = %self.request.name, %error, "write failed");
        error
    }

    fn record_failure(&mut self, failure: WriteFailure) -> io::Error {
        let err = failure.to_io();
        self.failure.get_or_insert(failure);
        err
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "blob writer already closed")
}

/// Stage the name record, rename content into `objects/`, then publish the
/// record.
fn commit_blocking(
    layout: &StoreLayout,
    sync_mode: SyncMode,
    file: std::fs::File,
    temp_path: TempPath,
    name: BlobName,
    key: BlobKey,
    size: u64,
) -> StoreResult<BlobInfo> {
    if sync_mode == SyncMode::EveryBlob {
        file.sync_all()?;
    }
    drop(file);

    let record = NameRecord {
        key: key.clone(),
        size,
    };
    let staged = record::stage_blocking(layout, sync_mode, &name, &record)?;

    let object_path = layout.object_path(&key);
    let created = if object_path.is_file() {
        // Identical content is already stored; dropping the temp path deletes it.
        drop(temp_path);
        false
    } else {
        if let Some(parent) = object_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        temp_path
            .persist(&object_path)
            .map_err(|e| StoreError::Io(e.error))?;
        if sync_mode == SyncMode::EveryBlob {
            if let Err(e) = record::sync_parent(&object_path) {
                discard_object(&object_path);
                return Err(e.into());
            }
        }
        true
    };

    if let Err(err) = staged.commit(sync_mode) {
        if created {
            discard_object(&object_path);
        }
        return Err(err);
    }

    Ok(BlobInfo { name, key, size })
}

/// Remove an object this write created but could not bind to its name.
fn discard_object(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "uncommitted object removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove uncommitted object"),
    }
}

impl AsyncWrite for BlobWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if let Some(failure) = &this.failure {
            return Poll::Ready(Err(failure.to_io()));
        }
        if let Some(limit) = this.max_blob_size {
            if this.hasher.bytes_hashed() + buf.len() as u64 > limit {
                return Poll::Ready(Err(this.record_failure(WriteFailure::TooLarge { limit })));
            }
        }
        let Some(file) = this.file.as_mut() else {
            return Poll::Ready(Err(closed()));
        };

        match Pin::new(file).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.hasher.update(&buf[..n]);
                Poll::Ready(Ok(n))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(this.record_failure(WriteFailure::Io {
                kind: e.kind(),
                message: e.to_string(),
            }))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Err(closed())),
        }
    }

    /// Flushes buffered bytes. Shutting down does not commit; call
    /// [`BlobWriter::finish`].
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Err(closed())),
        }
    }
}

impl std::fmt::Debug for BlobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobWriter")
            .field("name", &self.request.name)
            .field("bytes_written", &self.hasher.bytes_hashed())
            .field("failed", &self.failure.is_some())
            .finish()
    }
}
