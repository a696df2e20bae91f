// src/engine/backend.rs

//! Pluggable task runner.
//!
//! The engine hands each scheduled task to a [`TaskRunner`] and only looks
//! at the [`RunResult`] it returns. Production uses [`PipelineTaskRunner`];
//! tests plug in a fake that records calls and returns scripted results.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::engine::{Failure, RunResult};
use crate::fs::FileSystem;
use crate::pipeline::{self, PipelineOptions};
use crate::stale::StalenessTracker;
use crate::task::Task;

pub type RunFuture = Pin<Box<dyn Future<Output = RunResult> + Send + 'static>>;

pub trait TaskRunner: Send + Sync {
    /// Run one task to completion. Failures are reported through the
    /// returned [`RunResult`], never by panicking.
    fn run_task(&self, task: Arc<Task>) -> RunFuture;
}

/// Production runner: compute the stale inputs, then run the pipeline over
/// them.
#[derive(Debug, Clone)]
pub struct PipelineTaskRunner {
    fs: Arc<dyn FileSystem>,
    options: PipelineOptions,
}

impl PipelineTaskRunner {
    pub fn new(fs: Arc<dyn FileSystem>, options: PipelineOptions) -> Self {
        Self { fs, options }
    }
}

impl TaskRunner for PipelineTaskRunner {
    fn run_task(&self, task: Arc<Task>) -> RunFuture {
        let fs = Arc::clone(&self.fs);
        let options = self.options;

        Box::pin(async move {
            // Directory walking and stat calls are blocking.
            let tracker = StalenessTracker::new(Arc::clone(&fs));
            let target = Arc::clone(&task);
            let stale = tokio::task::spawn_blocking(move || tracker.stale(&target)).await;

            let stale = match stale {
                Ok(Ok(stale)) => stale,
                Ok(Err(e)) => {
                    return RunResult::Failed(Failure::Task(format!(
                        "resolving sources: {e:#}"
                    )));
                }
                Err(e) => {
                    return RunResult::Failed(Failure::Task(format!(
                        "staleness check panicked: {e}"
                    )));
                }
            };

            debug!(task = %task.name(), stale = stale.len(), "stale inputs resolved");
            pipeline::run_task(task, stale, fs, options).await
        })
    }
}
