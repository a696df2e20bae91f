// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`runtime`] holds [`Engine`], which drives the [`crate::dag::Scheduler`]
//!   for one `execute` call: it dispatches ready tasks to a [`TaskRunner`]
//!   with bounded concurrency, feeds completions back and reports every
//!   result to the notifier.
//! - [`backend`] defines the [`TaskRunner`] seam and the production runner
//!   (staleness tracker + pipeline).

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Skipped,
    Failed,
}

/// Why an `execute` call happened; only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Requested on the command line (or the initial watch build).
    Manual,
    /// Requested by the watch loop after filesystem changes.
    FileWatch,
}

/// One input that failed, with the rendered error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFailure {
    pub input: PathBuf,
    pub error: String,
}

impl InputFailure {
    pub fn new(input: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            error: error.into(),
        }
    }
}

/// Why a task failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// One or more inputs (or the bundle) failed. Sorted by input path.
    Inputs(Vec<InputFailure>),
    /// The task never ran because the named upstream task failed.
    DependencyFailed(TaskName),
    /// The task could not be run at all (e.g. sources could not be listed).
    Task(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Inputs(inputs) => {
                write!(f, "{} input(s) failed", inputs.len())?;
                if let Some(first) = inputs.first() {
                    write!(f, "; first: {}: {}", first.input.display(), first.error)?;
                }
                Ok(())
            }
            Failure::DependencyFailed(dep) => write!(f, "dependency '{dep}' failed"),
            Failure::Task(msg) => write!(f, "{msg}"),
        }
    }
}

/// Result of running one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Success,
    /// Nothing was stale; no step ran.
    Skipped,
    Failed(Failure),
}

impl RunResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, RunResult::Failed(_))
    }

    pub fn outcome(&self) -> TaskOutcome {
        match self {
            RunResult::Success => TaskOutcome::Success,
            RunResult::Skipped => TaskOutcome::Skipped,
            RunResult::Failed(_) => TaskOutcome::Failed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunResult::Success => "success",
            RunResult::Skipped => "skipped",
            RunResult::Failed(_) => "failed",
        }
    }
}

/// Results of one `execute` call, keyed by task name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    results: BTreeMap<TaskName, RunResult>,
}

impl RunReport {
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            results: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, task: impl Into<TaskName>, result: RunResult) {
        self.results.insert(task.into(), result);
    }

    pub fn get(&self, task: &str) -> Option<&RunResult> {
        self.results.get(task)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskName, &RunResult)> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.results.values().any(RunResult::is_failed)
    }

    pub fn failed_tasks(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_failed())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Whether any task actually rebuilt something.
    pub fn any_success(&self) -> bool {
        self.results.values().any(|r| *r == RunResult::Success)
    }
}

pub mod backend;
pub mod runtime;

pub use backend::{PipelineTaskRunner, TaskRunner};
pub use runtime::{BatchExecutor, Engine};
