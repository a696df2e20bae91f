// src/dag/scheduler.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};

/// The immutable task graph plus mutable per-run state.
///
/// The scheduler is pure: it never touches the filesystem or spawns work.
/// It decides which requested tasks are ready (all dependencies done), marks
/// them running, records completions and fails the dependents of a failed
/// task. The engine drives it and does the IO.
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<TaskGraph>,
    tasks: HashMap<TaskName, TaskInfo>,
    run_counter: u64,
    /// `None` when no run is active.
    current_run_id: Option<u64>,
}

impl Scheduler {
    pub fn new(graph: Arc<TaskGraph>) -> Self {
        let tasks = graph
            .tasks()
            .enumerate()
            .map(|(i, task)| (task.name().to_string(), TaskInfo::new(i, Arc::clone(task))))
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Returns `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        Some(ReadOnlyStateManager::new(&self.tasks).deps_satisfied_for_info(info))
    }

    /// Start a new run, resetting every task's per-run state.
    pub fn start_new_run(&mut self) -> u64 {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
        self.run_counter
    }

    /// Request a task (and, implicitly, its upstream dependencies) for the
    /// current run.
    pub fn step_request(&mut self, task: &str) -> SchedulerStep {
        if self.current_run_id.is_none() {
            warn!(task = %task, "request with no active run; implicitly starting a new run");
            self.start_new_run();
        }

        if self.tasks.contains_key(task) {
            let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
            manager.mark_task_and_dependencies_pending(task);
        } else {
            warn!(task = %task, "request for unknown task; ignoring");
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    /// Request several tasks at once; ready tasks come back in declaration
    /// order regardless of request order.
    pub fn step_request_all(&mut self, tasks: &[TaskName]) -> SchedulerStep {
        if self.current_run_id.is_none() {
            self.start_new_run();
        }
        {
            let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
            for task in tasks {
                manager.mark_task_and_dependencies_pending(task);
            }
        }
        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    /// Record that a running task finished with `outcome`.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let mut newly_scheduled = Vec::new();
        let mut newly_failed = Vec::new();

        match self.tasks.get_mut(task) {
            Some(info) => match outcome {
                TaskOutcome::Success | TaskOutcome::Skipped => {
                    info.run_state = Some(if outcome == TaskOutcome::Success {
                        RunState::DoneSuccess
                    } else {
                        RunState::DoneSkipped
                    });
                    debug!(task = %info.name, run_id, ?outcome, "task completed");
                    let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                    newly_scheduled.extend(manager.collect_new_ready_tasks());
                }
                TaskOutcome::Failed => {
                    info.run_state = Some(RunState::DoneFailed);
                    warn!(task = %info.name, run_id, "task failed; failing dependents in this run");
                    newly_failed.push(info.name.clone());
                    let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                    newly_failed.append(&mut manager.mark_dependents_failed(task));
                    // Independent branches may still have become ready.
                    newly_scheduled.extend(manager.collect_new_ready_tasks());
                }
            },
            None => warn!(task = %task, "completion for unknown task; ignoring"),
        }

        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            run_just_finished,
        }
    }

    /// Clear the active run if every task is terminal. Returns `true` if this
    /// call finished the run.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }
        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        if manager.all_tasks_terminal() {
            info!(run_id = self.current_run_id, "scheduler: all tasks terminal; run finished");
            self.current_run_id = None;
            true
        } else {
            false
        }
    }
}
