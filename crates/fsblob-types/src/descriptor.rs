use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::key::BlobKey;
use crate::name::BlobName;

/// Identifies a blob for read, existence, and removal.
///
/// Either field may be omitted, but not both:
/// - `{name, key}` resolves the name and requires its current key to match
/// - `{key}` resolves content directly
/// - `{name}` resolves through whatever key the name currently carries
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<BlobName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<BlobKey>,
}

impl BlobDescriptor {
    pub fn new(name: BlobName, key: BlobKey) -> Self {
        Self {
            name: Some(name),
            key: Some(key),
        }
    }

    pub fn by_key(key: BlobKey) -> Self {
        Self {
            name: None,
            key: Some(key),
        }
    }

    pub fn by_name(name: BlobName) -> Self {
        Self {
            name: Some(name),
            key: None,
        }
    }

    /// Build a descriptor from optional raw strings, validating both.
    pub fn parse(name: Option<&str>, key: Option<&str>) -> Result<Self, TypeError> {
        let descriptor = Self {
            name: name.map(BlobName::parse).transpose()?,
            key: key.map(BlobKey::parse).transpose()?,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// A descriptor must name at least one of `name` or `key`.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.name.is_none() && self.key.is_none() {
            return Err(TypeError::EmptyDescriptor);
        }
        Ok(())
    }
}

impl fmt::Display for BlobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.key) {
            (Some(name), Some(key)) => write!(f, "{name}@{}", key.short_hex()),
            (Some(name), None) => write!(f, "{name}"),
            (None, Some(key)) => write!(f, "@{key}"),
            (None, None) => write!(f, "<empty>"),
        }
    }
}

/// Parameters for a new write: the target name and, optionally, the key the
/// caller expects the content to hash to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRequest {
    pub name: BlobName,
    pub expected_key: Option<BlobKey>,
}

impl WriteRequest {
    pub fn new(name: BlobName) -> Self {
        Self {
            name,
            expected_key: None,
        }
    }

    /// Fail the write unless the content hashes to `key`.
    pub fn with_expected_key(mut self, key: BlobKey) -> Self {
        self.expected_key = Some(key);
        self
    }
}

impl From<BlobName> for WriteRequest {
    fn from(name: BlobName) -> Self {
        Self::new(name)
    }
}

/// Metadata reported when a write commits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobInfo {
    pub name: BlobName,
    pub key: BlobKey,
    pub size: u64,
}

impl BlobInfo {
    /// The full `{name, key}` descriptor for this blob.
    pub fn descriptor(&self) -> BlobDescriptor {
        BlobDescriptor::new(self.name.clone(), self.key.clone())
    }
}

impl From<&BlobInfo> for BlobDescriptor {
    fn from(info: &BlobInfo) -> Self {
        info.descriptor()
    }
}
