// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::TaskGraph;
use crate::engine::TaskName;

pub struct StateManager<'a> {
    graph: &'a TaskGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Include a requested task and all its upstream dependencies in this run.
    ///
    /// Tasks not yet part of the run become `Pending`; tasks already in the
    /// run keep their state.
    pub fn mark_task_and_dependencies_pending(&mut self, root: &str) {
        let mut stack: Vec<TaskName> = vec![root.to_string()];
        let mut visited: HashSet<TaskName> = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            match self.tasks.get_mut(&name) {
                Some(info) => {
                    if info.run_state.is_none() {
                        info.run_state = Some(RunState::Pending);
                        debug!(task = %info.name, "marked Pending for this run");
                    }
                    stack.extend(info.deps.iter().cloned());
                }
                None => warn!(task = %name, "node in graph not present in tasks map"),
            }
        }
    }

    /// Whether every dependency of `info` finished successfully (or was
    /// skipped) in the current run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        ReadOnlyStateManager::new(self.tasks).deps_satisfied_for_info(info)
    }

    /// Mark every pending dependent (transitively) of a failed task as
    /// `DoneFailed`. The failed task itself is not included in the result.
    pub fn mark_dependents_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();
        let mut newly_failed = Vec::new();

        while let Some(name) = stack.pop() {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };
            match info.run_state {
                Some(RunState::Pending) | Some(RunState::Running) => {
                    info.run_state = Some(RunState::DoneFailed);
                    debug!(
                        task = %info.name,
                        upstream = %failed_task,
                        "marking dependent as DoneFailed due to upstream failure"
                    );
                    newly_failed.push(info.name.clone());
                    stack.extend(self.graph.dependents_of(&name).iter().cloned());
                }
                _ => {}
            }
        }

        newly_failed.sort_by_key(|n| self.graph.position(n));
        newly_failed
    }

    /// Mark every `Pending` task whose dependencies are satisfied as
    /// `Running` and return them in declaration order.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let mut candidates: Vec<(usize, TaskName)> = self
            .tasks
            .values()
            .filter(|info| {
                matches!(info.run_state, Some(RunState::Pending))
                    && self.deps_satisfied_for_info(info)
            })
            .map(|info| (info.order, info.name.clone()))
            .collect();
        candidates.sort();

        let run_id = self.current_run_id.unwrap_or(0);
        let mut ready = Vec::with_capacity(candidates.len());
        for (_, name) in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                info!(task = %info.name, run_id, "dependencies satisfied; scheduling task");
                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(info, run_id));
            }
        }
        ready
    }

    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        })
    }
}

/// Shared-reference variant used by `Scheduler::deps_satisfied`.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| {
            let Some(dep) = self.tasks.get(dep_name) else {
                warn!(task = %info.name, dep = %dep_name, "dependency missing from tasks map");
                return false;
            };
            dep.run_state.is_some_and(RunState::satisfies_dependents)
        })
    }
}
