// src/watch/event_loop.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::engine::{BatchExecutor, RunReport, TaskName};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::report::ReloadChannel;
use crate::watch::hash::ContentHashes;
use crate::watch::patterns::{WatchBindings, relative_to_root};
use crate::watch::WatchEvent;

/// State of the watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    /// Collecting changes until the debounce deadline.
    Debouncing,
    /// A batch is executing; new changes are queued.
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub debounce: Duration,
    pub use_hash: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            use_hash: false,
        }
    }
}

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Batches executed.
    pub runs: usize,
    /// Batches with at least one failed task (or a fatal error).
    pub failed_runs: usize,
    /// Reload channel invocations.
    pub reloads: usize,
}

type InFlight = JoinHandle<Result<RunReport>>;

enum Wake {
    Event(Option<WatchEvent>),
    Deadline,
    Finished(std::result::Result<Result<RunReport>, JoinError>),
}

/// Turns filesystem change events into batched `execute` calls.
///
/// The debounce window is fixed from the first change: events arriving
/// while debouncing join the pending set without pushing the deadline out.
/// Only one batch runs at a time; changes seen meanwhile start a fresh
/// window once it finishes. `Stop` lets the in-flight batch finish.
pub struct WatchLoop<E: BatchExecutor + 'static> {
    root: PathBuf,
    bindings: WatchBindings,
    executor: Arc<E>,
    fs: Arc<dyn FileSystem>,
    reload: Option<Arc<dyn ReloadChannel>>,
    hashes: ContentHashes,
    options: WatchOptions,
    state: LoopState,
    summary: WatchSummary,
}

impl<E: BatchExecutor + 'static> std::fmt::Debug for WatchLoop<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchLoop")
            .field("root", &self.root)
            .field("state", &self.state)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E: BatchExecutor + 'static> WatchLoop<E> {
    pub fn new(
        root: impl Into<PathBuf>,
        bindings: WatchBindings,
        executor: Arc<E>,
        fs: Arc<dyn FileSystem>,
        options: WatchOptions,
    ) -> Self {
        Self {
            root: root.into(),
            bindings,
            executor,
            fs,
            reload: None,
            hashes: ContentHashes::new(),
            options,
            state: LoopState::Idle,
            summary: WatchSummary::default(),
        }
    }

    pub fn with_reload(mut self, reload: Arc<dyn ReloadChannel>) -> Self {
        self.reload = Some(reload);
        self
    }

    /// Seed the content hashes so the first save of an unchanged file is
    /// already recognised as a no-op. Only meaningful with `use_hash`.
    pub fn prime_hashes<'a>(&mut self, paths: impl IntoIterator<Item = &'a Path>) {
        self.hashes.prime(self.fs.as_ref(), paths);
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<WatchEvent>) -> Result<WatchSummary> {
        let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
        let mut deadline: Option<Instant> = None;
        let mut in_flight: Option<InFlight> = None;
        let mut stopping = false;

        info!(root = %self.root.display(), "watch loop started");

        while self.state != LoopState::Stopped {
            let wake = match self.state {
                LoopState::Idle => Wake::Event(events.recv().await),
                LoopState::Debouncing => {
                    let Some(at) = deadline else {
                        self.state = LoopState::Idle;
                        continue;
                    };
                    tokio::select! {
                        ev = events.recv() => Wake::Event(ev),
                        _ = sleep_until(at) => Wake::Deadline,
                    }
                }
                LoopState::Running => {
                    let Some(handle) = in_flight.as_mut() else {
                        self.state = LoopState::Idle;
                        continue;
                    };
                    tokio::select! {
                        res = handle => Wake::Finished(res),
                        ev = events.recv(), if !stopping => Wake::Event(ev),
                    }
                }
                LoopState::Stopped => break,
            };

            match wake {
                Wake::Event(None) | Wake::Event(Some(WatchEvent::Stop)) => {
                    if self.state == LoopState::Running {
                        info!("stop requested; waiting for the running batch");
                        stopping = true;
                    } else {
                        self.state = LoopState::Stopped;
                    }
                }
                Wake::Event(Some(WatchEvent::Changed(path))) => {
                    if !self.is_relevant(&path) {
                        continue;
                    }
                    debug!(path = %path.display(), state = ?self.state, "change recorded");
                    pending.insert(path);
                    if self.state == LoopState::Idle {
                        deadline = Some(Instant::now() + self.options.debounce);
                        self.state = LoopState::Debouncing;
                    }
                }
                Wake::Deadline => {
                    deadline = None;
                    let batch = std::mem::take(&mut pending);
                    in_flight = self.dispatch(batch).await;
                    self.state = if in_flight.is_some() {
                        LoopState::Running
                    } else {
                        LoopState::Idle
                    };
                }
                Wake::Finished(res) => {
                    in_flight = None;
                    self.finish_batch(res);
                    if stopping {
                        self.state = LoopState::Stopped;
                    } else if pending.is_empty() {
                        self.state = LoopState::Idle;
                    } else {
                        deadline = Some(Instant::now() + self.options.debounce);
                        self.state = LoopState::Debouncing;
                    }
                }
            }
        }

        info!(runs = self.summary.runs, failed = self.summary.failed_runs, "watch loop stopped");
        Ok(self.summary)
    }

    /// Cheap pre-filter applied on arrival: the path must be under the root
    /// and must match at least one binding or the reload set.
    fn is_relevant(&self, path: &Path) -> bool {
        let Some(rel) = relative_to_root(&self.root, path) else {
            return false;
        };
        let resolution = self.bindings.resolve(&rel);
        !resolution.tasks.is_empty() || resolution.reload
    }

    /// Resolve the pending paths and start a batch. Returns `None` when no
    /// task needs to run (only reload paths, or every change was a no-op).
    async fn dispatch(&mut self, paths: BTreeSet<PathBuf>) -> Option<InFlight> {
        let mut tasks: Vec<TaskName> = Vec::new();
        let mut changed: Vec<String> = Vec::new();
        let mut reload_only: Vec<String> = Vec::new();

        for path in paths {
            let Some(rel) = relative_to_root(&self.root, &path) else {
                continue;
            };
            if self.options.use_hash && !self.hashes.changed(self.fs.as_ref(), &path) {
                continue;
            }
            let resolution = self.bindings.resolve(&rel);
            if resolution.tasks.is_empty() {
                if resolution.reload {
                    reload_only.push(rel);
                }
                continue;
            }
            for task in resolution.tasks {
                if !tasks.contains(&task) {
                    tasks.push(task);
                }
            }
            changed.push(rel);
        }

        if !reload_only.is_empty() {
            self.poke_reload(&reload_only).await;
        }
        if tasks.is_empty() {
            debug!("debounce window closed with nothing to run");
            return None;
        }

        info!(?tasks, changed = changed.len(), "changes detected; running batch");
        self.summary.runs += 1;
        let executor = Arc::clone(&self.executor);
        let reload = self.reload.clone();
        Some(tokio::spawn(async move {
            let report = executor.execute_batch(tasks).await?;
            if report.any_success() {
                if let Some(reload) = reload {
                    if let Err(e) = reload.reload(&changed).await {
                        warn!("reload channel failed: {e:#}");
                    }
                }
            }
            Ok(report)
        }))
    }

    fn finish_batch(&mut self, res: std::result::Result<Result<RunReport>, JoinError>) {
        match res {
            Ok(Ok(report)) => {
                if report.has_failures() {
                    self.summary.failed_runs += 1;
                    warn!(failed = ?report.failed_tasks(), "batch finished with failures");
                } else {
                    debug!(tasks = report.len(), "batch finished");
                }
                if report.any_success() && self.reload.is_some() {
                    self.summary.reloads += 1;
                }
            }
            Ok(Err(e)) => {
                self.summary.failed_runs += 1;
                error!("batch failed: {e}");
            }
            Err(e) => {
                self.summary.failed_runs += 1;
                error!("batch task panicked: {e}");
            }
        }
    }

    async fn poke_reload(&mut self, changed: &[String]) {
        let Some(reload) = &self.reload else {
            return;
        };
        self.summary.reloads += 1;
        if let Err(e) = reload.reload(changed).await {
            warn!("reload channel failed: {e:#}");
        }
    }
}
