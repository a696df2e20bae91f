// src/watch/hash.rs

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// blake3 hex digest of a file's contents.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last seen content hash per path, used to drop change events that did not
/// change anything (editors touching a file on save, `git checkout` of the
/// same content).
#[derive(Debug, Default)]
pub struct ContentHashes {
    hashes: HashMap<PathBuf, String>,
}

impl ContentHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current hash of each path without reporting changes.
    pub fn prime<'a>(&mut self, fs: &dyn FileSystem, paths: impl IntoIterator<Item = &'a Path>) {
        for path in paths {
            if let Ok(hash) = compute_file_hash(fs, path) {
                self.hashes.insert(path.to_path_buf(), hash);
            }
        }
    }

    /// Whether `path` differs from the last time it was seen, updating the
    /// record. Unknown and unreadable (e.g. deleted) paths count as changed.
    pub fn changed(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        match compute_file_hash(fs, path) {
            Ok(hash) => {
                let previous = self.hashes.insert(path.to_path_buf(), hash.clone());
                let changed = previous.as_deref() != Some(hash.as_str());
                if !changed {
                    debug!(path = %path.display(), "content hash unchanged; ignoring event");
                }
                changed
            }
            Err(_) => {
                self.hashes.remove(path);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn rewriting_same_content_is_not_a_change() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/a.css", "body{}");
        let mut hashes = ContentHashes::new();

        assert!(hashes.changed(&fs, Path::new("/p/a.css")));
        fs.add_file("/p/a.css", "body{}");
        assert!(!hashes.changed(&fs, Path::new("/p/a.css")));
        fs.add_file("/p/a.css", "body{color:red}");
        assert!(hashes.changed(&fs, Path::new("/p/a.css")));
    }

    #[test]
    fn deleted_file_counts_as_changed() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/a.css", "x");
        let mut hashes = ContentHashes::new();
        hashes.prime(&fs, [Path::new("/p/a.css")]);
        assert_eq!(hashes.len(), 1);

        fs.remove_file(Path::new("/p/a.css")).unwrap();
        assert!(hashes.changed(&fs, Path::new("/p/a.css")));
        assert!(hashes.is_empty());
    }
}
