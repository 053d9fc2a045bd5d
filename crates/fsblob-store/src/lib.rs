//! Filesystem-backed, content-addressed blob storage.
//!
//! Blobs are written as byte streams under a caller-chosen name. Each write
//! yields a content key (the BLAKE3 hash of the bytes) once the data is
//! durably committed. Blobs can then be read back as streams by name, by
//! key, or by both.
//!
//! # On-disk Layout
//!
//! Under the configured root:
//!
//! - `objects/<shard>/<key>` -- content, one file per distinct key
//! - `names/<segment>/.../<last>~ref` -- name record pointing at a key
//! - `tmp/` -- in-flight writes, never visible to readers
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`FsBlobStore`] -- the filesystem store, with streaming
//!   [`BlobWriter`]/[`BlobReader`] handles
//! - [`InMemoryBlobStore`] -- map-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Content is immutable once written; identical bytes share one object.
//! 2. Write-then-link: content is renamed into `objects/` before the name
//!    record is published, and publishing the record is the commit point.
//! 3. A write resolves exactly once: [`BlobWriter::finish`] consumes the writer.
//! 4. Failed or abandoned writes leave nothing visible.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod fs;
pub mod layout;
pub mod memory;
pub mod reader;
mod record;
pub mod traits;
pub mod writer;

pub use config::{StoreConfig, SyncMode};
pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use layout::StoreLayout;
pub use memory::InMemoryBlobStore;
pub use reader::BlobReader;
pub use traits::{BlobStore, BoxReader};
pub use writer::BlobWriter;
