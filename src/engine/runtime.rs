// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, Scheduler, TaskGraph};
use crate::engine::{Failure, RunReport, RunResult, TaskName, TaskRunner, TriggerReason};
use crate::errors::{AssetdagError, Result};
use crate::report::Notifier;

/// Async shell around the pure [`Scheduler`].
///
/// `execute` runs the requested tasks plus their transitive dependencies.
/// A task starts only once every dependency finished with `Success` or
/// `Skipped`; at most `concurrency` tasks run at once; dependents of a
/// failed task are reported as failed without running; independent
/// branches keep going. Calls to `execute` are serialized.
pub struct Engine {
    graph: Arc<TaskGraph>,
    scheduler: Mutex<Scheduler>,
    runner: Arc<dyn TaskRunner>,
    notifier: Arc<Notifier>,
    concurrency: usize,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("tasks", &self.graph.len())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        graph: Arc<TaskGraph>,
        runner: Arc<dyn TaskRunner>,
        notifier: Arc<Notifier>,
        concurrency: usize,
    ) -> Self {
        Self {
            scheduler: Mutex::new(Scheduler::new(Arc::clone(&graph))),
            graph,
            runner,
            notifier,
            concurrency: concurrency.max(1),
        }
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub async fn execute(&self, requested: &[TaskName]) -> Result<RunReport> {
        self.execute_with_reason(requested, TriggerReason::Manual).await
    }

    pub async fn execute_with_reason(
        &self,
        requested: &[TaskName],
        reason: TriggerReason,
    ) -> Result<RunReport> {
        for name in requested {
            if self.graph.task(name).is_none() {
                return Err(AssetdagError::TaskNotFound(name.clone()));
            }
        }

        let mut scheduler = self.scheduler.lock().await;
        let run_id = scheduler.start_new_run();
        info!(run_id, ?requested, ?reason, "starting run");

        let mut report = RunReport::new(run_id);
        let mut ready: VecDeque<ScheduledTask> =
            scheduler.step_request_all(requested).newly_scheduled.into();
        let mut running: JoinSet<(TaskName, RunResult)> = JoinSet::new();
        // Channel deliveries run beside the dispatch loop so a slow
        // notify command never holds back ready tasks.
        let mut deliveries: JoinSet<()> = JoinSet::new();

        loop {
            while running.len() < self.concurrency {
                let Some(scheduled) = ready.pop_front() else {
                    break;
                };
                debug!(task = %scheduled.name, run_id, "dispatching task");
                let runner = Arc::clone(&self.runner);
                running.spawn(async move {
                    let name = scheduled.name.clone();
                    // Inner spawn so a panicking runner still yields a result.
                    let handle = tokio::spawn(async move { runner.run_task(scheduled.task).await });
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => RunResult::Failed(Failure::Task(format!("task runner panicked: {e}"))),
                    };
                    (name, result)
                });
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let (name, result) = joined.map_err(|e| {
                AssetdagError::Other(anyhow::anyhow!("task dispatch failed: {e}"))
            })?;

            self.announce(&mut deliveries, &name, &result);
            let step = scheduler.step_completion(&name, result.outcome());
            report.insert(name.clone(), result);

            for blocked in step.newly_failed.into_iter().filter(|n| *n != name) {
                let result = RunResult::Failed(Failure::DependencyFailed(name.clone()));
                self.announce(&mut deliveries, &blocked, &result);
                report.insert(blocked, result);
            }
            ready.extend(step.newly_scheduled);
        }

        while deliveries.join_next().await.is_some() {}

        if !scheduler.is_idle() {
            warn!(run_id, "run ended with tasks neither finished nor failed");
        }
        info!(run_id, tasks = report.len(), failed = ?report.failed_tasks(), "run finished");
        Ok(report)
    }

    fn announce(&self, deliveries: &mut JoinSet<()>, task: &str, result: &RunResult) {
        let Some(note) = self.notifier.announce(task, result) else {
            return;
        };
        let notifier = Arc::clone(&self.notifier);
        let task = task.to_string();
        deliveries.spawn(async move { notifier.deliver(&task, &note).await });
    }
}

pub type BatchFuture<'a> = Pin<Box<dyn Future<Output = Result<RunReport>> + Send + 'a>>;

/// What the watch loop needs from the engine. Tests substitute a recorder.
pub trait BatchExecutor: Send + Sync {
    fn execute_batch(&self, tasks: Vec<TaskName>) -> BatchFuture<'_>;
}

impl BatchExecutor for Engine {
    fn execute_batch(&self, tasks: Vec<TaskName>) -> BatchFuture<'_> {
        Box::pin(async move { self.execute_with_reason(&tasks, TriggerReason::FileWatch).await })
    }
}
