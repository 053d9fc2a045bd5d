use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use fsblob_crypto::ContentHasher;
use fsblob_types::{BlobDescriptor, BlobInfo, BlobKey, BlobName, TypeError, WriteRequest};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, BoxReader};

/// In-memory blob store.
///
/// Intended for tests and embedding. Content and name bindings live behind
/// async `RwLock`s; a write buffers its whole input before committing.
pub struct InMemoryBlobStore {
    objects: RwLock<HashMap<BlobKey, Bytes>>,
    names: RwLock<BTreeMap<BlobName, BlobKey>>,
    max_blob_size: Option<u64>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            names: RwLock::new(BTreeMap::new()),
            max_blob_size: None,
        }
    }

    /// Reject writes larger than `limit` bytes.
    pub fn with_max_blob_size(mut self, limit: u64) -> Self {
        self.max_blob_size = Some(limit);
        self
    }

    /// Number of distinct content objects held.
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Total bytes across all distinct content objects.
    pub async fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .await
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    async fn resolve(&self, descriptor: &BlobDescriptor) -> StoreResult<Option<BlobKey>> {
        match (&descriptor.name, &descriptor.key) {
            (None, None) => Err(TypeError::EmptyDescriptor.into()),
            (None, Some(key)) => Ok(Some(key.clone())),
            (Some(name), expected) => {
                let names = self.names.read().await;
                Ok(match (names.get(name), expected) {
                    (Some(current), Some(key)) if current != key => None,
                    (current, _) => current.cloned(),
                })
            }
        }
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put_reader(
        &self,
        request: WriteRequest,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<BlobInfo> {
        let mut buf = Vec::new();
        match self.max_blob_size {
            Some(limit) => {
                reader.take(limit.saturating_add(1)).read_to_end(&mut buf).await?;
                if buf.len() as u64 > limit {
                    return Err(StoreError::TooLarge {
                        name: request.name,
                        limit,
                    });
                }
            }
            None => {
                reader.read_to_end(&mut buf).await?;
            }
        }

        let key = ContentHasher::hash(&buf);
        if let Some(expected) = request.expected_key {
            if expected != key {
                return Err(StoreError::KeyMismatch {
                    name: request.name,
                    expected,
                    computed: key,
                });
            }
        }

        let size = buf.len() as u64;
        self.objects
            .write()
            .await
            .entry(key.clone())
            .or_insert_with(|| Bytes::from(buf));
        self.names
            .write()
            .await
            .insert(request.name.clone(), key.clone());

        Ok(BlobInfo {
            name: request.name,
            key,
            size,
        })
    }

    async fn open(&self, descriptor: &BlobDescriptor) -> StoreResult<BoxReader> {
        let not_found = || StoreError::NotFound(descriptor.clone());
        let key = self.resolve(descriptor).await?.ok_or_else(not_found)?;
        let data = self
            .objects
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(not_found)?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn exists(&self, descriptor: &BlobDescriptor) -> StoreResult<bool> {
        let Some(key) = self.resolve(descriptor).await? else {
            return Ok(false);
        };
        Ok(self.objects.read().await.contains_key(&key))
    }

    async fn list(&self) -> StoreResult<Vec<BlobName>> {
        Ok(self.names.read().await.keys().cloned().collect())
    }

    async fn remove(&self, descriptor: &BlobDescriptor) -> StoreResult<bool> {
        let name = descriptor.name.as_ref().ok_or(TypeError::MissingName)?;
        let mut names = self.names.write().await;
        let current = names.get(name).cloned();
        match (current, &descriptor.key) {
            (Some(current), Some(key)) if current != *key => Ok(false),
            (Some(_), _) => Ok(names.remove(name).is_some()),
            (None, _) => Ok(false),
        }
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("max_blob_size", &self.max_blob_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> BlobName {
        BlobName::parse(s).unwrap()
    }

    #[tokio::test]
    async fn write_and_read_back() {
        let store = InMemoryBlobStore::new();
        let info = store
            .put_bytes(WriteRequest::new(name("hello.txt")), b"hello world")
            .await
            .unwrap();
        assert_eq!(info.size, 11);
        assert_eq!(info.key, ContentHasher::hash(b"hello world"));

        let data = store.get_bytes(&info.descriptor()).await.unwrap();
        assert_eq!(&data[..], b"hello world");
    }

    #[tokio::test]
    async fn identical_content_is_stored_once() {
        let store = InMemoryBlobStore::new();
        let a = store.put_bytes(WriteRequest::new(name("a")), b"same").await.unwrap();
        let b = store.put_bytes(WriteRequest::new(name("b")), b"same").await.unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!(store.object_count().await, 1);
        assert_eq!(store.total_bytes().await, 4);
        assert_eq!(store.list().await.unwrap(), vec![name("a"), name("b")]);
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let store = InMemoryBlobStore::new();
        let descriptor = BlobDescriptor::by_name(name("missing"));
        assert!(store.open(&descriptor).await.err().unwrap().is_not_found());
        assert!(!store.exists(&descriptor).await.unwrap());
    }

    #[tokio::test]
    async fn size_limit_rejects_write() {
        let store = InMemoryBlobStore::new().with_max_blob_size(3);
        let err = store
            .put_bytes(WriteRequest::new(name("big")), b"four")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { limit: 3, .. }));
        assert!(store.list().await.unwrap().is_empty());

        store.put_bytes(WriteRequest::new(name("ok")), b"abc").await.unwrap();
    }

    #[tokio::test]
    async fn expected_key_mismatch_commits_nothing() {
        let store = InMemoryBlobStore::new();
        let request = WriteRequest::new(name("x")).with_expected_key(ContentHasher::hash(b"other"));
        let err = store.put_bytes(request, b"actual").await.unwrap_err();
        assert!(matches!(err, StoreError::KeyMismatch { .. }));
        assert_eq!(store.object_count().await, 0);
    }

    #[tokio::test]
    async fn remove_respects_key() {
        let store = InMemoryBlobStore::new();
        let info = store.put_bytes(WriteRequest::new(name("doc")), b"v1").await.unwrap();

        let stale = BlobDescriptor::new(name("doc"), ContentHasher::hash(b"v0"));
        assert!(!store.remove(&stale).await.unwrap());
        assert!(store.remove(&info.descriptor()).await.unwrap());
        assert!(!store.exists(&info.descriptor()).await.unwrap());
        assert!(store.exists(&BlobDescriptor::by_key(info.key)).await.unwrap());
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", InMemoryBlobStore::default());
        assert!(debug.contains("InMemoryBlobStore"));
    }
}
