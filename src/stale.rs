// src/stale.rs

//! Staleness tracking.
//!
//! An input is stale when any artifact it produces is missing or has an
//! older modification time than the input. Bundle tasks are all-or-nothing:
//! if any input is newer than the bundle (or the bundle is missing) every
//! input is returned, since the bundle has to be rebuilt from all of them.
//!
//! Files matched only by a task's extra `watch` patterns (stylesheet
//! partials, say) count too: the newest of them is a lower bound for the
//! modification time of every input. A bundle is also stale when a source
//! directory changed after it was written, which is how a deleted input
//! shows up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::task::{SourceFile, SourceSelector, Task};
use crate::types::OutputMode;

#[derive(Debug, Clone)]
pub struct StalenessTracker {
    fs: Arc<dyn FileSystem>,
}

impl StalenessTracker {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Inputs of `task` that need to be rebuilt, in selector order.
    ///
    /// Read-only: calling this twice without touching the filesystem in
    /// between returns the same list.
    pub fn stale(&self, task: &Task) -> Result<Vec<SourceFile>> {
        let walk = task.selector().walk(self.fs.as_ref())?;
        let sources = walk.files;
        if sources.is_empty() {
            return Ok(sources);
        }
        let watched = self.newest_watched(task)?;

        let stale = match task.mode() {
            OutputMode::PerFile => sources
                .into_iter()
                .filter(|src| {
                    let artifacts: Vec<PathBuf> = task
                        .artifacts_for(&src.rel)
                        .iter()
                        .map(|rel| task.destination().artifact(rel))
                        .collect();
                    let mtime = self.fs.modified(&src.path).map(|m| m.max(watched.unwrap_or(m)));
                    self.is_stale(mtime, &artifacts)
                })
                .collect(),
            OutputMode::Bundle => {
                let newest = sources.iter().map(|s| self.fs.modified(&s.path)).max().flatten();
                // Directories inside the destination change whenever the
                // bundle itself is written.
                let dirs = walk
                    .dirs
                    .iter()
                    .filter(|d| !d.starts_with(task.destination().dir()))
                    .filter_map(|d| self.fs.modified(d))
                    .max();
                let newest = newest.map(|m| m.max(watched.unwrap_or(m)).max(dirs.unwrap_or(m)));
                let artifacts: Vec<PathBuf> = task
                    .bundle_artifacts()
                    .iter()
                    .map(|rel| task.destination().artifact(rel))
                    .collect();
                if self.is_stale(newest, &artifacts) {
                    sources
                } else {
                    Vec::new()
                }
            }
        };

        debug!(task = %task.name(), stale = stale.len(), "staleness computed");
        Ok(stale)
    }

    /// Newest modification time among files matched by the task's watch
    /// patterns other than its source pattern. Artifacts under the task's
    /// destination are ignored.
    fn newest_watched(&self, task: &Task) -> Result<Option<SystemTime>> {
        let selector = task.selector();
        let mut newest = None;
        for pattern in task
            .watch_patterns()
            .iter()
            .filter(|p| p.as_str() != selector.pattern())
        {
            let watched = SourceSelector::new(selector.root(), pattern.clone())?
                .with_excludes(selector.excludes())?;
            for file in watched.resolve(self.fs.as_ref())? {
                if file.path.starts_with(task.destination().dir()) {
                    continue;
                }
                newest = newest.max(self.fs.modified(&file.path));
            }
        }
        if let Some(mtime) = newest {
            trace!(task = %task.name(), ?mtime, "newest watched file");
        }
        Ok(newest)
    }

    /// `source_mtime` of `None` means the source vanished after resolution;
    /// that counts as stale so the pipeline reports the read failure.
    fn is_stale(&self, source_mtime: Option<SystemTime>, artifacts: &[PathBuf]) -> bool {
        let Some(source_mtime) = source_mtime else {
            return true;
        };
        artifacts.iter().any(|artifact| match self.fs.modified(artifact) {
            None => {
                trace!(artifact = %artifact.display(), "artifact missing");
                true
            }
            Some(artifact_mtime) => artifact_mtime < source_mtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::task::{Destination, SourceSelector};
    use std::time::{Duration, UNIX_EPOCH};

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn equal_mtimes_are_fresh() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file_at("/p/src/a.txt", "a", at(100));
        fs.add_file_at("/p/out/a.txt", "a", at(100));

        let task = Task::new(
            "copy",
            SourceSelector::new("/p", "src/*.txt").unwrap(),
            Destination::new("/p/out"),
        );
        let tracker = StalenessTracker::new(fs);
        assert!(tracker.stale(&task).unwrap().is_empty());
    }
}
