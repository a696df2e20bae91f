// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use tempfile::NamedTempFile;

pub mod mock;

/// Abstract filesystem interface.
///
/// Everything that touches sources or artifacts goes through this trait so
/// staleness and pipeline behaviour can be tested against [`mock::MockFileSystem`].
pub trait FileSystem: Send + Sync + Debug {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Write `contents` to `path` so that readers either see the previous
    /// file or the complete new one, never a truncated artifact.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Last modification time, or `None` if the path does not exist.
    fn modified(&self, path: &Path) -> Option<SystemTime>;

    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("reading file {:?}", path))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path).with_context(|| format!("opening file {:?}", path))?;
        Ok(Box::new(file))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| anyhow!("artifact path {:?} has no parent directory", path))?;
        fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;

        // The temp file lives next to the target so the final rename never
        // crosses a filesystem boundary.
        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temp file in {:?}", parent))?;
        tmp.write_all(contents)
            .with_context(|| format!("writing temp file for {:?}", path))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("syncing temp file for {:?}", path))?;
        tmp.persist(path)
            .map_err(|e| anyhow!("renaming temp file onto {:?}: {}", path, e.error))?;
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("removing file {:?}", path))
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}
