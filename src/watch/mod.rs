// src/watch/mod.rs

//! File watching.
//!
//! - [`watcher`] wires up the `notify` watcher and forwards raw changed
//!   paths into a channel.
//! - [`patterns`] compiles each task's watch patterns into bindings.
//! - [`event_loop`] debounces changes and runs batches through the engine.
//! - [`hash`] optionally drops changes that did not alter file contents.

pub mod event_loop;
pub mod hash;
pub mod patterns;
pub mod watcher;

use std::path::PathBuf;

pub use event_loop::{LoopState, WatchLoop, WatchOptions, WatchSummary};
pub use hash::{ContentHashes, compute_file_hash};
pub use patterns::{Resolution, WatchBinding, WatchBindings};
pub use watcher::{WatcherHandle, spawn_watcher};

/// Input of the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A path was created, modified or removed.
    Changed(PathBuf),
    /// Stop after the in-flight batch (Ctrl-C).
    Stop,
}
