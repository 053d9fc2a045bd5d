use fsblob_types::BlobKey;

/// One-shot content hasher.
pub struct ContentHasher;

impl ContentHasher {
    /// Derive the key of a complete byte sequence.
    pub fn hash(data: &[u8]) -> BlobKey {
        BlobKey::from_digest(*blake3::hash(data).as_bytes())
    }

    /// Verify that data produces the expected key.
    pub fn verify(data: &[u8], expected: &BlobKey) -> bool {
        Self::hash(data) == *expected
    }

    /// Start an incremental hash.
    pub fn accumulator() -> HashAccumulator {
        HashAccumulator::new()
    }
}

/// Incremental hasher fed chunk by chunk as bytes stream through a write or a
/// verified read.
///
/// The resulting key depends only on the concatenated bytes, never on how
/// they were chunked.
#[derive(Clone)]
pub struct HashAccumulator {
    hasher: blake3::Hasher,
    bytes: u64,
}

impl HashAccumulator {
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
            bytes: 0,
        }
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes
    }

    /// The key of the bytes fed so far, without consuming the accumulator.
    pub fn current_key(&self) -> BlobKey {
        BlobKey::from_digest(*self.hasher.finalize().as_bytes())
    }

    /// Finish hashing, returning the key and the total byte count.
    pub fn finalize(self) -> (BlobKey, u64) {
        (self.current_key(), self.bytes)
    }
}

impl Default for HashAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HashAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashAccumulator")
            .field("bytes", &self.bytes)
            .finish()
    }
}
