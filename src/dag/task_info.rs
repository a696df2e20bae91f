// src/dag/task_info.rs

//! Task metadata and per-run state.

use std::sync::Arc;

use crate::engine::TaskName;
use crate::task::Task;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of this run but waiting on dependencies.
    Pending,
    /// Handed to the task runner.
    Running,
    DoneSuccess,
    /// Completed with nothing stale to rebuild.
    DoneSkipped,
    /// Failed in this run, or blocked by a failed dependency.
    DoneFailed,
}

impl RunState {
    /// Whether dependents may start after this state.
    pub fn satisfies_dependents(self) -> bool {
        matches!(self, RunState::DoneSuccess | RunState::DoneSkipped)
    }
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not participating in this run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneSkipped,
    DoneFailed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneSkipped) => TaskRunState::DoneSkipped,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
        }
    }
}

/// Static task information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    /// Declaration index; ready tasks are dispatched in this order.
    pub order: usize,
    pub task: Arc<Task>,
    /// Direct dependencies (names in `after = [...]`).
    pub deps: Vec<TaskName>,

    /// None if not participating in the current run.
    pub run_state: Option<RunState>,
}

impl TaskInfo {
    pub fn new(order: usize, task: Arc<Task>) -> Self {
        Self {
            name: task.name().to_string(),
            order,
            deps: task.deps().to_vec(),
            task,
            run_state: None,
        }
    }
}

/// A task the scheduler wants the runner to start now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub task: Arc<Task>,
    /// All tasks dispatched by one `execute` call share a run id.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            task: Arc::clone(&info.task),
            run_id,
        }
    }
}
