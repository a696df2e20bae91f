// src/dag/mod.rs

//! Task graph and scheduling.
//!
//! - [`graph`] validates the tasks and holds their dependency edges.
//! - [`scheduler`] is the per-run state machine deciding which requested
//!   tasks are ready and which are blocked by a failed dependency.
//! - [`task_info`] and [`scheduler_step`] are its data types.
//! - [`state_manager`] holds the state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::TaskGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskRunState};
