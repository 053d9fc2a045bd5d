//! Content hashing for fsblob.
//!
//! Blob keys are the plain BLAKE3 digest of the blob's bytes, hex-encoded, so
//! a key can be reproduced with any BLAKE3 implementation (e.g. `b3sum`).
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;

pub use hasher::{ContentHasher, HashAccumulator};
