use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use fsblob_types::{BlobDescriptor, BlobInfo, BlobKey, BlobName, TypeError, WriteRequest};
use tokio::fs::{self, File};
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::layout::StoreLayout;
use crate::reader::BlobReader;
use crate::record;
use crate::traits::{BlobStore, BoxReader};
use crate::writer::BlobWriter;

/// Filesystem-backed blob store rooted at a caller-provisioned directory.
///
/// Cloning is cheap; clones share the same root and configuration.
#[derive(Clone)]
pub struct FsBlobStore {
    layout: Arc<StoreLayout>,
    config: Arc<StoreConfig>,
}

impl FsBlobStore {
    /// Open a store on `config.root`, creating the internal `objects/`,
    /// `names/`, and `tmp/` directories if needed. The root itself must
    /// already exist.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;

        match fs::metadata(&config.root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StoreError::RootMissing(config.root.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::RootMissing(config.root.clone()))
            }
            Err(e) => return Err(e.into()),
        }

        let layout = StoreLayout::new(&config.root, config.shard_depth);
        layout.ensure_dirs().await?;

        info!(root = %config.root.display(), sync_mode = ?config.sync_mode, "blob store opened");
        Ok(Self {
            layout: Arc::new(layout),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Start a streaming write. Feed the returned [`BlobWriter`] with
    /// [`AsyncWrite`](tokio::io::AsyncWrite) calls, then call
    /// [`BlobWriter::finish`] to commit.
    pub async fn create_write_stream(&self, request: WriteRequest) -> StoreResult<BlobWriter> {
        BlobWriter::create(
            request,
            Arc::clone(&self.layout),
            self.config.sync_mode,
            self.config.max_blob_size,
        )
        .await
    }

    /// Open a committed blob as a one-pass byte source.
    ///
    /// Fails with [`StoreError::NotFound`] (before any byte is produced) when
    /// the descriptor does not resolve to a committed blob.
    pub async fn create_read_stream(&self, descriptor: &BlobDescriptor) -> StoreResult<BlobReader> {
        let key = self
            .resolve(descriptor)
            .await?
            .ok_or_else(|| StoreError::NotFound(descriptor.clone()))?;

        let file = match File::open(self.layout.object_path(&key)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(descriptor.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        // Short keys can map onto a shard directory.
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StoreError::NotFound(descriptor.clone()));
        }
        let size = meta.len();

        debug!(%descriptor, key = %key.short_hex(), size, "read opened");
        Ok(BlobReader::new(
            file,
            key,
            size,
            self.config.read_chunk_size,
            self.config.verify_reads,
        ))
    }

    /// Remove temporary artifacts left behind by writers that never
    /// resolved (e.g. after a crash). Must not run while writes are in
    /// flight. Returns the number of files removed.
    pub async fn purge_temp(&self) -> StoreResult<usize> {
        let mut entries = fs::read_dir(self.layout.temp_dir()).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "failed to purge temp artifact");
                    return Err(e.into());
                }
            }
        }
        if removed > 0 {
            info!(removed, "purged stale temp artifacts");
        }
        Ok(removed)
    }

    /// Resolve a descriptor to the key of its content.
    ///
    /// `Ok(None)` means well-formed but absent: an unknown name, or a name
    /// whose current key differs from the one supplied.
    async fn resolve(&self, descriptor: &BlobDescriptor) -> StoreResult<Option<BlobKey>> {
        match (&descriptor.name, &descriptor.key) {
            (None, None) => Err(TypeError::EmptyDescriptor.into()),
            (None, Some(key)) => Ok(Some(key.clone())),
            (Some(name), expected) => {
                let Some(record) = record::load(&self.layout, name).await? else {
                    return Ok(None);
                };
                match expected {
                    Some(key) if *key != record.key => Ok(None),
                    _ => Ok(Some(record.key)),
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_reader(
        &self,
        request: WriteRequest,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> StoreResult<BlobInfo> {
        let mut writer = self.create_write_stream(request).await?;
        match tokio::io::copy(reader, &mut writer).await {
            Ok(_) => writer.finish().await,
            Err(e) => Err(writer.abort_with(e)),
        }
    }

    async fn open(&self, descriptor: &BlobDescriptor) -> StoreResult<BoxReader> {
        let reader = self.create_read_stream(descriptor).await?;
        Ok(Box::new(reader))
    }

    async fn exists(&self, descriptor: &BlobDescriptor) -> StoreResult<bool> {
        let Some(key) = self.resolve(descriptor).await? else {
            return Ok(false);
        };
        match fs::metadata(self.layout.object_path(&key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StoreResult<Vec<BlobName>> {
        let layout = Arc::clone(&self.layout);
        let names = tokio::task::spawn_blocking(move || -> StoreResult<Vec<BlobName>> {
            let mut names = Vec::new();
            for entry in WalkDir::new(layout.names_dir()).min_depth(1) {
                let entry = entry.map_err(io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match layout.name_from_record_path(entry.path()) {
                    Some(name) => names.push(name),
                    None => warn!(path = %entry.path().display(), "ignoring stray file under names/"),
                }
            }
            Ok(names)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))??;

        debug!(count = names.len(), "listed blobs");
        Ok(names)
    }

    /// The key check and the unlink are separate steps. A rewrite of the
    /// same name that lands between them is removed too: between a rewrite
    /// and a remove, the last one wins.
    async fn remove(&self, descriptor: &BlobDescriptor) -> StoreResult<bool> {
        let name = descriptor.name.as_ref().ok_or(TypeError::MissingName)?;
        if self.resolve(descriptor).await?.is_none() {
            return Ok(false);
        }
        match fs::remove_file(self.layout.name_path(name)).await {
            Ok(()) => {
                debug!(%name, "name removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for FsBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsBlobStore")
            .field("root", &self.layout.root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsblob_crypto::ContentHasher;
    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const DEEP_NAME: &str = "deep/subdir/long-filename-test.js";
    const NEVER_WRITTEN: &str = "8843d7f92416211de9ebb963ff4ce28125932878";

    async fn create_test_store(config: impl FnOnce(StoreConfig) -> StoreConfig) -> (FsBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(config(StoreConfig::new(dir.path())))
            .await
            .unwrap();
        (store, dir)
    }

    fn name(s: &str) -> BlobName {
        BlobName::parse(s).unwrap()
    }

    async fn write_chunks(store: &FsBlobStore, target: &str, chunks: &[&[u8]]) -> BlobInfo {
        let mut w = store.create_write_stream(WriteRequest::new(name(target))).await.unwrap();
        for chunk in chunks {
            w.write_all(chunk).await.unwrap();
        }
        w.finish().await.unwrap()
    }

    #[tokio::test]
    async fn open_requires_existing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = FsBlobStore::open(StoreConfig::new(&missing)).await.unwrap_err();
        assert!(matches!(err, StoreError::RootMissing(_)));
        assert!(!missing.exists());

        let file = dir.path().join("file");
        std::fs::write(&file, b"").unwrap();
        let err = FsBlobStore::open(StoreConfig::new(&file)).await.unwrap_err();
        assert!(matches!(err, StoreError::RootMissing(_)));
    }

    #[tokio::test]
    async fn piped_chunks_produce_a_key() {
        let (store, _dir) = create_test_store(|c| c).await;
        let info = write_chunks(&store, DEEP_NAME, &[b"foo", b"bar"]).await;
        assert!(!info.key.as_str().is_empty());
        assert_eq!(info.name.as_str(), DEEP_NAME);
        assert_eq!(info.size, 6);
    }

    #[tokio::test]
    async fn read_back_as_stream() {
        let (store, _dir) = create_test_store(|c| c.with_read_chunk_size(2)).await;
        let info = write_chunks(&store, DEEP_NAME, &[b"foo", b"bar"]).await;

        let reader = store.create_read_stream(&info.descriptor()).await.unwrap();
        assert_eq!(reader.size(), 6);
        let chunks: Vec<_> = reader.into_stream().map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.concat(), b"foobar");
        assert!(chunks.iter().all(|c| c.len() <= 2));
    }

    #[tokio::test]
    async fn read_by_key_alone_and_by_name_alone() {
        let (store, _dir) = create_test_store(|c| c).await;
        let info = write_chunks(&store, DEEP_NAME, &[b"foobar"]).await;

        for descriptor in [
            BlobDescriptor::by_key(info.key.clone()),
            BlobDescriptor::by_name(info.name.clone()),
        ] {
            let mut out = Vec::new();
            store
                .create_read_stream(&descriptor)
                .await
                .unwrap()
                .read_to_end(&mut out)
                .await
                .unwrap();
            assert_eq!(out, b"foobar");
        }
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let (store, _dir) = create_test_store(|c| c).await;
        let descriptor = BlobDescriptor::parse(Some(DEEP_NAME), Some(NEVER_WRITTEN)).unwrap();
        let err = store.create_read_stream(&descriptor).await.unwrap_err();
        assert!(err.is_not_found());

        let by_key = BlobDescriptor::parse(None, Some(NEVER_WRITTEN)).unwrap();
        assert!(store.create_read_stream(&by_key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn name_with_stale_key_is_not_found() {
        let (store, _dir) = create_test_store(|c| c).await;
        write_chunks(&store, "doc", &[b"v1"]).await;
        let stale = ContentHasher::hash(b"v0");
        let descriptor = BlobDescriptor::new(name("doc"), stale);
        assert!(store.create_read_stream(&descriptor).await.unwrap_err().is_not_found());
        assert!(!store.exists(&descriptor).await.unwrap());
    }

    #[tokio::test]
    async fn exists_before_and_after_write() {
        let (store, _dir) = create_test_store(|c| c).await;
        let descriptor = BlobDescriptor::parse(Some(DEEP_NAME), Some(NEVER_WRITTEN)).unwrap();
        assert!(!store.exists(&descriptor).await.unwrap());

        let info = write_chunks(&store, DEEP_NAME, &[b"foo", b"bar"]).await;
        assert!(store.exists(&info.descriptor()).await.unwrap());
    }

    #[tokio::test]
    async fn exists_rejects_empty_descriptor() {
        let (store, _dir) = create_test_store(|c| c).await;
        let empty = BlobDescriptor { name: None, key: None };
        assert!(store.exists(&empty).await.unwrap_err().is_invalid());
    }

    #[tokio::test]
    async fn list_returns_committed_names() {
        let (store, _dir) = create_test_store(|c| c).await;
        let mut expected = vec!["hello.txt", DEEP_NAME, "subdir/filename.txt"];
        for n in &expected {
            write_chunks(&store, n, &[b"foo", b"bar"]).await;
        }

        // An in-flight write must not show up.
        let mut pending = store.create_write_stream(WriteRequest::new(name("pending"))).await.unwrap();
        pending.write_all(b"not yet").await.unwrap();
        pending.flush().await.unwrap();

        let mut listed: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        listed.sort();
        expected.sort();
        assert_eq!(listed, expected);
        drop(pending);
    }

    #[tokio::test]
    async fn parent_and_child_names_coexist() {
        let (store, _dir) = create_test_store(|c| c).await;
        write_chunks(&store, "a", &[b"parent"]).await;
        write_chunks(&store, "a/b", &[b"child"]).await;

        let mut listed = store.list().await.unwrap();
        listed.sort();
        assert_eq!(listed, vec![name("a"), name("a/b")]);
        assert_eq!(
            &store.get_bytes(&BlobDescriptor::by_name(name("a"))).await.unwrap()[..],
            b"parent"
        );
    }

    #[tokio::test]
    async fn concurrent_writes_to_one_name_stay_whole() {
        let (store, _dir) = create_test_store(|c| c).await;
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![i; 64 * 1024]).collect();

        let mut tasks = Vec::new();
        for payload in payloads.clone() {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .put_bytes(WriteRequest::new(name("contended")), &payload)
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let data = store
            .get_bytes(&BlobDescriptor::by_name(name("contended")))
            .await
            .unwrap();
        assert!(payloads.iter().any(|p| p[..] == data[..]));
        assert_eq!(store.list().await.unwrap(), vec![name("contended")]);
        assert_eq!(std::fs::read_dir(store.layout().temp_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rewrite_rebinds_name() {
        let (store, _dir) = create_test_store(|c| c).await;
        let v1 = write_chunks(&store, "doc", &[b"first"]).await;
        let v2 = write_chunks(&store, "doc", &[b"second"]).await;
        assert_ne!(v1.key, v2.key);

        assert!(!store.exists(&v1.descriptor()).await.unwrap());
        assert!(store.exists(&v2.descriptor()).await.unwrap());
        // Old content stays addressable by key.
        assert!(store.exists(&BlobDescriptor::by_key(v1.key)).await.unwrap());
    }

    #[tokio::test]
    async fn remove_forgets_the_name() {
        let (store, _dir) = create_test_store(|c| c).await;
        let info = write_chunks(&store, "gone/soon", &[b"bye"]).await;

        assert!(store.remove(&info.descriptor()).await.unwrap());
        assert!(!store.exists(&info.descriptor()).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.remove(&info.descriptor()).await.unwrap());

        let key_only = BlobDescriptor::by_key(info.key);
        assert!(store.remove(&key_only).await.unwrap_err().is_invalid());
    }

    #[tokio::test]
    async fn producer_error_aborts_stream_write() {
        let (store, _dir) = create_test_store(|c| c).await;
        let chunks: Vec<io::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from_static(b"foo")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "producer died")),
        ];
        let err = store
            .put_stream(WriteRequest::new(name("broken")), futures::stream::iter(chunks).boxed())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(store.layout().temp_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn size_limit_through_put_reader() {
        let (store, _dir) = create_test_store(|c| c.with_max_blob_size(4)).await;
        let err = store
            .put_bytes(WriteRequest::new(name("big")), b"too many bytes")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { limit: 4, .. }));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_reads_catches_on_disk_corruption() {
        let (store, _dir) = create_test_store(|c| c.with_verify_reads(true)).await;
        let info = write_chunks(&store, "fragile", &[b"pristine"]).await;
        std::fs::write(store.layout().object_path(&info.key), b"damaged!").unwrap();

        let err = store.get_bytes(&info.descriptor()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == io::ErrorKind::InvalidData));
    }

    #[tokio::test]
    async fn purge_temp_removes_leftovers() {
        let (store, _dir) = create_test_store(|c| c).await;
        std::fs::write(store.layout().temp_dir().join("blob-stale"), b"junk").unwrap();
        assert_eq!(store.purge_temp().await.unwrap(), 1);
        assert_eq!(store.purge_temp().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reopen_sees_previous_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let info = {
            let store = FsBlobStore::open(StoreConfig::new(dir.path())).await.unwrap();
            write_chunks(&store, "persisted", &[b"data"]).await
        };
        let store = FsBlobStore::open(StoreConfig::new(dir.path())).await.unwrap();
        assert!(store.exists(&info.descriptor()).await.unwrap());
        assert_eq!(&store.get_bytes(&info.descriptor()).await.unwrap()[..], b"data");
    }

    #[tokio::test]
    async fn failed_name_publish_leaves_key_unreadable() {
        let (store, _dir) = create_test_store(|c| c).await;
        std::fs::write(store.layout().names_dir().join("p"), b"not a directory").unwrap();

        let result = store.put_bytes(WriteRequest::new(name("p/q")), b"secret").await;
        assert!(result.is_err());

        let by_key = BlobDescriptor::by_key(ContentHasher::hash(b"secret"));
        assert!(!store.exists(&by_key).await.unwrap());
        assert!(store.get_bytes(&by_key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn failed_name_rename_leaves_key_unreadable() {
        let (store, _dir) = create_test_store(|c| c).await;
        let target = name("squatted");
        std::fs::create_dir_all(store.layout().name_path(&target).join("child")).unwrap();

        assert!(store.put_bytes(WriteRequest::new(target), b"orphan").await.is_err());
        let by_key = BlobDescriptor::by_key(ContentHasher::hash(b"orphan"));
        assert!(!store.exists(&by_key).await.unwrap());
    }

    #[tokio::test]
    async fn remove_with_stale_key_keeps_current_binding() {
        let (store, _dir) = create_test_store(|c| c).await;
        let v1 = write_chunks(&store, "doc", &[b"v1"]).await;
        let v2 = write_chunks(&store, "doc", &[b"v2"]).await;

        assert!(!store.remove(&v1.descriptor()).await.unwrap());
        assert!(store.exists(&v2.descriptor()).await.unwrap());
        assert!(store.remove(&BlobDescriptor::by_name(name("doc"))).await.unwrap());
        assert!(!store.exists(&v2.descriptor()).await.unwrap());
    }

    #[tokio::test]
    async fn short_key_on_shard_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StoreConfig::new(dir.path());
        config.shard_depth = 2;
        let store = FsBlobStore::open(config).await.unwrap();

        let short = BlobKey::parse("ab").unwrap();
        std::fs::create_dir_all(store.layout().object_path(&short)).unwrap();

        let descriptor = BlobDescriptor::by_key(short);
        assert!(store.create_read_stream(&descriptor).await.unwrap_err().is_not_found());
        assert!(!store.exists(&descriptor).await.unwrap());
    }
}
