//! Read pipeline.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use fsblob_crypto::HashAccumulator;
use fsblob_types::BlobKey;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::ReaderStream;
use tracing::warn;

/// One-pass byte source for a committed blob.
///
/// Implements [`AsyncRead`]; [`into_stream`](Self::into_stream) turns it into
/// a stream of chunks. Dropping the reader at any point closes the file.
pub struct BlobReader {
    file: File,
    key: BlobKey,
    size: u64,
    chunk_size: usize,
    verifier: Option<HashAccumulator>,
}

impl BlobReader {
    pub(crate) fn new(file: File, key: BlobKey, size: u64, chunk_size: usize, verify: bool) -> Self {
        Self {
            file,
            key,
            size,
            chunk_size,
            verifier: verify.then(HashAccumulator::new),
        }
    }

    /// Key of the blob being read.
    pub fn key(&self) -> &BlobKey {
        &self.key
    }

    /// Size of the blob in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the blob as chunks of at most the configured read chunk size.
    pub fn into_stream(self) -> ReaderStream<Self> {
        let capacity = self.chunk_size;
        ReaderStream::with_capacity(self, capacity)
    }
}

impl AsyncRead for BlobReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let had_room = buf.remaining() > 0;
        let before = buf.filled().len();

        ready!(Pin::new(&mut this.file).poll_read(cx, buf))?;

        if let Some(verifier) = this.verifier.as_mut() {
            let fresh = &buf.filled()[before..];
            if !fresh.is_empty() {
                verifier.update(fresh);
            } else if had_room {
                // End of file: the content must still hash to its key.
                let computed = verifier.current_key();
                this.verifier = None;
                if computed != this.key {
                    warn!(expected = %this.key, actual = %computed, "blob hash mismatch");
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "content hash mismatch: expected {}, computed {}",
                            this.key, computed
                        ),
                    )));
                }
            }
        }

        Poll::Ready(Ok(()))
    }
}

impl std::fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReader")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("verifying", &self.verifier.is_some())
            .finish()
    }
}
