//! Foundation types for fsblob.
//!
//! Every other fsblob crate depends on `fsblob-types`.
//!
//! # Key Types
//!
//! - [`BlobKey`] -- lowercase hex content key (BLAKE3 digest for stored blobs)
//! - [`BlobName`] -- validated, `/`-delimited logical name
//! - [`BlobDescriptor`] -- `{name, key}` pair identifying a blob for reads
//! - [`WriteRequest`] -- target name plus optional expected key for a write
//! - [`BlobInfo`] -- `{name, key, size}` reported when a write commits

pub mod descriptor;
pub mod error;
pub mod key;
pub mod name;

pub use descriptor::{BlobDescriptor, BlobInfo, WriteRequest};
pub use error::TypeError;
pub use key::BlobKey;
pub use name::BlobName;
