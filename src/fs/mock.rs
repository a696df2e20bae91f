// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir {
        children: Vec<String>,
        /// Bumped whenever a child is added or removed.
        modified: SystemTime,
    },
}

impl MockEntry {
    fn empty_dir() -> Self {
        MockEntry::Dir {
            children: Vec::new(),
            modified: UNIX_EPOCH,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Logical clock in seconds since the epoch; every write advances it.
    clock: u64,
}

/// In-memory filesystem with a logical modification clock.
///
/// Each `add_file` / `write_atomic` stamps the file with the next clock tick,
/// so a file written later is always strictly newer than one written before.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Ensure root exists
        entries.insert(PathBuf::from("."), MockEntry::empty_dir());

        Self {
            state: Arc::new(Mutex::new(MockState { entries, clock: 0 })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        state.clock += 1;
        let modified = UNIX_EPOCH + Duration::from_secs(state.clock);
        insert_file(&mut state.entries, path.as_ref(), content.into(), modified);
    }

    /// Add a file with an explicit modification time. The clock is moved
    /// forward to it, so later writes are still strictly newer.
    pub fn add_file_at(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        modified: SystemTime,
    ) {
        let mut state = self.lock();
        let secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        state.clock = state.clock.max(secs);
        insert_file(&mut state.entries, path.as_ref(), content.into(), modified);
    }

    /// Mark an existing file as modified "now" on the logical clock.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        state.clock += 1;
        let now = UNIX_EPOCH + Duration::from_secs(state.clock);
        if let Some(MockEntry::File { modified, .. }) = state.entries.get_mut(path.as_ref()) {
            *modified = now;
        }
    }

    /// Paths of all files currently stored, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let state = self.lock();
        let mut files: Vec<PathBuf> = state
            .entries
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File { .. }))
            .map(|(p, _)| p.clone())
            .collect();
        files.sort();
        files
    }
}

fn normalize_parent(parent: &Path) -> &Path {
    if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    }
}

fn insert_file(
    entries: &mut HashMap<PathBuf, MockEntry>,
    path: &Path,
    content: Vec<u8>,
    modified: SystemTime,
) {
    entries.insert(path.to_path_buf(), MockEntry::File { content, modified });

    // Ensure parent directories exist implicitly for simplicity in this mock
    if let Some(parent) = path.parent() {
        let parent = normalize_parent(parent);
        ensure_dir_entry(entries, parent, modified);
        add_child(entries, parent, path, modified);
    }
}

/// Writing a file replaces its directory entry, so the parent's mtime
/// moves forward even when the child already existed.
fn add_child(
    entries: &mut HashMap<PathBuf, MockEntry>,
    parent: &Path,
    child: &Path,
    now: SystemTime,
) {
    if let Some(MockEntry::Dir { children, modified }) = entries.get_mut(parent) {
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            if !children.iter().any(|c| c == name) {
                children.push(name.to_string());
            }
            *modified = (*modified).max(now);
        }
    }
}

fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path, now: SystemTime) {
    if entries.contains_key(path) {
        return;
    }
    entries.insert(path.to_path_buf(), MockEntry::empty_dir());
    if let Some(parent) = path.parent() {
        let parent = normalize_parent(parent);
        if parent != path {
            // Avoid infinite loop at root
            ensure_dir_entry(entries, parent, now);
            add_child(entries, parent, path, now);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { content, .. }) => Ok(content.clone()),
            Some(MockEntry::Dir { .. }) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let content = self.read(path)?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { .. }) => {}
            Some(MockEntry::Dir { .. }) => return Err(anyhow!("Is a directory: {:?}", path)),
            None => return Err(anyhow!("File not found: {:?}", path)),
        }
        state.entries.remove(path);
        state.clock += 1;
        let now = UNIX_EPOCH + Duration::from_secs(state.clock);
        if let Some(parent) = path.parent() {
            let parent = normalize_parent(parent);
            let name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
            if let (Some(MockEntry::Dir { children, modified }), Some(name)) =
                (state.entries.get_mut(parent), name)
            {
                children.retain(|c| *c != name);
                *modified = now;
            }
        }
        Ok(())
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { modified, .. }) | Some(MockEntry::Dir { modified, .. }) => {
                Some(*modified)
            }
            None => None,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir { .. }))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // In mock, we just return the path as is, assuming absolute paths are used in tests
        Ok(path.to_path_buf())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::Dir { children, .. }) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
