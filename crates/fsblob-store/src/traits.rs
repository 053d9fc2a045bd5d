use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use fsblob_types::{BlobDescriptor, BlobInfo, BlobName, WriteRequest};
use futures::stream::BoxStream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

use crate::error::StoreResult;

/// Boxed byte source returned by [`BlobStore::open`].
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - The key of a blob is a pure function of its bytes.
/// - A write becomes visible to `open`, `exists`, and `list` only once it
///   has returned its [`BlobInfo`]; a failed write leaves nothing behind.
/// - Blobs are immutable. Rewriting a name binds it to the new content's key.
/// - `open` on an absent blob fails with an error whose
///   [`is_not_found`](crate::StoreError::is_not_found) is `true`.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stream `reader` to end of input and commit it under `request.name`.
    async fn put_reader(
        &self,
        request: WriteRequest,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<BlobInfo>;

    /// Open a committed blob for reading.
    async fn open(&self, descriptor: &BlobDescriptor) -> StoreResult<BoxReader>;

    /// Check whether the descriptor resolves to a committed blob.
    ///
    /// Returns `Ok(false)` for a well-formed descriptor that matches nothing.
    async fn exists(&self, descriptor: &BlobDescriptor) -> StoreResult<bool>;

    /// Names of all committed blobs, in no particular order.
    async fn list(&self) -> StoreResult<Vec<BlobName>>;

    /// Forget a name. Returns `true` if a matching name was removed.
    ///
    /// Content stays addressable by key; the descriptor must carry a name.
    /// A rewrite racing a removal of the same name may be removed as well.
    async fn remove(&self, descriptor: &BlobDescriptor) -> StoreResult<bool>;

    /// Commit an in-memory buffer.
    async fn put_bytes(&self, request: WriteRequest, data: &[u8]) -> StoreResult<BlobInfo> {
        let mut reader = data;
        self.put_reader(request, &mut reader).await
    }

    /// Commit a stream of chunks. A producer error aborts the write and is
    /// returned as the write's only result.
    async fn put_stream(
        &self,
        request: WriteRequest,
        stream: BoxStream<'static, io::Result<Bytes>>,
    ) -> StoreResult<BlobInfo> {
        let mut reader = StreamReader::new(stream);
        self.put_reader(request, &mut reader).await
    }

    /// Read a whole blob into memory.
    async fn get_bytes(&self, descriptor: &BlobDescriptor) -> StoreResult<Bytes> {
        let mut reader = self.open(descriptor).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}
