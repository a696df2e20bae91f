// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::info;

use crate::watch::WatchEvent;

/// Keeps the underlying `RecommendedWatcher` alive. Dropping it stops file
/// watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").field("root", &self.root).finish()
    }
}

impl WatcherHandle {
    /// The canonicalized directory being watched.
    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

/// Watch `root` recursively and forward every changed path as
/// [`WatchEvent::Changed`].
///
/// Access events (reads, opens) are dropped; everything that can change
/// content or existence is forwarded. Matching against task patterns is
/// left to the watch loop.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    events: mpsc::UnboundedSender<WatchEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // The callback runs on notify's own thread.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    if events.send(WatchEvent::Changed(path)).is_err() {
                        // Loop has stopped; nothing left to notify.
                        return;
                    }
                }
            }
            Err(err) => eprintln!("assetdag: file watch error: {err}"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    Ok(WatcherHandle {
        _inner: watcher,
        root,
    })
}
