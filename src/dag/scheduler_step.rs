// src/dag/scheduler_step.rs

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Result of a single scheduler step.
///
/// Tests step the scheduler by hand and assert on these.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready, in declaration order.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks newly marked failed in this step: the failed task itself first,
    /// then every pending dependent it blocked.
    pub newly_failed: Vec<TaskName>,
    /// Whether this step left no pending or running task.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn scheduled_names(&self) -> Vec<&str> {
        self.newly_scheduled.iter().map(|t| t.name.as_str()).collect()
    }
}
