//! Blob name validation.
//!
//! Valid blob names:
//! - Must be non-empty and at most [`MAX_NAME_LEN`] bytes
//! - Are `/`-delimited; segments must be non-empty (no leading, trailing or
//!   consecutive slashes)
//! - Must not contain `.` or `..` segments
//! - Segments are at most [`MAX_SEGMENT_LEN`] bytes
//! - Must not contain control characters or any of [`FORBIDDEN_CHARS`]
//!
//! A name that passes these rules maps to a relative path that stays inside
//! the store root on every platform.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator between name segments.
pub const SEPARATOR: char = '/';

/// Maximum total length of a name, in bytes.
pub const MAX_NAME_LEN: usize = 1024;

/// Maximum length of a single segment, in bytes. Leaves room under the
/// common 255-byte filename limit for the record suffix.
pub const MAX_SEGMENT_LEN: usize = 200;

/// Characters that are forbidden anywhere in a name. `~` is reserved for the
/// on-disk name record suffix.
pub const FORBIDDEN_CHARS: &[char] = &['\\', ':', '*', '?', '"', '<', '>', '|', '~'];

/// Validated hierarchical blob name, e.g. `deep/subdir/long-filename-test.js`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobName(String);

impl BlobName {
    /// Validate and wrap a name.
    pub fn parse(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/`-delimited segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// The final segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }
}

/// Validate a blob name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use fsblob_types::name::validate_name;
///
/// assert!(validate_name("hello.txt").is_ok());
/// assert!(validate_name("deep/subdir/long-filename-test.js").is_ok());
/// assert!(validate_name("").is_err());
/// assert!(validate_name("../escape").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: String| TypeError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(format!("name exceeds {MAX_NAME_LEN} bytes")));
    }

    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(invalid(format!("contains control character: {ch:?}")));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }

    if name.starts_with(SEPARATOR) || name.ends_with(SEPARATOR) {
        return Err(invalid("must not start or end with '/'".into()));
    }

    for segment in name.split(SEPARATOR) {
        match segment {
            "" => return Err(invalid("segments must not be empty".into())),
            "." | ".." => {
                return Err(invalid(format!("relative segment not allowed: {segment:?}")))
            }
            s if s.len() > MAX_SEGMENT_LEN => {
                return Err(invalid(format!("segment exceeds {MAX_SEGMENT_LEN} bytes")))
            }
            _ => {}
        }
    }

    Ok(())
}

impl fmt::Debug for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobName({:?})", self.0)
    }
}

impl fmt::Display for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BlobName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for BlobName {
    type Error = TypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<BlobName> for String {
    fn from(name: BlobName) -> Self {
        name.0
    }
}
