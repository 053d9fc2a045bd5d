//! On-disk layout of a store root.
//!
//! ```text
//! <root>/
//!   objects/<k0k1>/<key>            committed content, raw bytes
//!   names/<seg>/<seg>/<last>~ref    committed name records
//!   tmp/                            in-flight write artifacts
//! ```
//!
//! Name segments become directories, and the final segment becomes a record
//! file carrying the [`RECORD_SUFFIX`]. Names may not contain `~`, so a
//! record file never collides with a directory created for a deeper name:
//! `a` and `a/b` coexist as `names/a~ref` and `names/a/b~ref`.

use std::io;
use std::path::{Component, Path, PathBuf};

use fsblob_types::{BlobKey, BlobName};

pub const OBJECTS_DIR: &str = "objects";
pub const NAMES_DIR: &str = "names";
pub const TMP_DIR: &str = "tmp";

/// Suffix appended to the final segment of a name record file.
pub const RECORD_SUFFIX: &str = "~ref";

/// Maps keys and names to paths under a store root, and record paths back to
/// names.
#[derive(Clone, Debug)]
pub struct StoreLayout {
    root: PathBuf,
    objects_dir: PathBuf,
    names_dir: PathBuf,
    temp_dir: PathBuf,
    shard_depth: u8,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>, shard_depth: u8) -> Self {
        let root = root.into();
        Self {
            objects_dir: root.join(OBJECTS_DIR),
            names_dir: root.join(NAMES_DIR),
            temp_dir: root.join(TMP_DIR),
            root,
            shard_depth,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn names_dir(&self) -> &Path {
        &self.names_dir
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Path of the committed content for `key`.
    pub fn object_path(&self, key: &BlobKey) -> PathBuf {
        let hex = key.as_str();
        let mut path = self.objects_dir.clone();
        for i in 0..self.shard_depth as usize {
            let start = i * 2;
            let end = start + 2;
            if end <= hex.len() {
                path.push(&hex[start..end]);
            }
        }
        path.push(hex);
        path
    }

    /// Path of the name record for `name`.
    pub fn name_path(&self, name: &BlobName) -> PathBuf {
        let mut path = self.names_dir.clone();
        let mut segments = name.segments().peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{segment}{RECORD_SUFFIX}"));
            }
        }
        debug_assert!(path.starts_with(&self.names_dir));
        path
    }

    /// Inverse of [`name_path`](Self::name_path). Returns `None` for paths
    /// outside `names/` and for files that are not name records.
    pub fn name_from_record_path(&self, path: &Path) -> Option<BlobName> {
        let relative = path.strip_prefix(&self.names_dir).ok()?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(s) => segments.push(s.to_str()?),
                _ => return None,
            }
        }

        let last = segments.pop()?.strip_suffix(RECORD_SUFFIX)?;
        segments.push(last);
        BlobName::parse(segments.join("/")).ok()
    }

    /// Create the `objects/`, `names/`, and `tmp/` directories.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [&self.objects_dir, &self.names_dir, &self.temp_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}
