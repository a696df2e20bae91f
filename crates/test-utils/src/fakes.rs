//! Fake collaborators: task runner, batch executor, notification and
//! reload channels, steps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use assetdag::engine::backend::RunFuture;
use assetdag::engine::runtime::BatchFuture;
use assetdag::engine::{BatchExecutor, RunReport, RunResult, TaskName, TaskRunner};
use assetdag::errors::StepError;
use assetdag::report::{ChannelFuture, Notification, NotificationChannel, ReloadChannel};
use assetdag::step::{Asset, FnStep, Step};
use assetdag::task::Task;

/// Records which tasks ran (in start order) and returns scripted results.
///
/// Tasks without a scripted result succeed. With a delay, it also tracks
/// the highest number of tasks in flight at once.
#[derive(Clone, Default)]
pub struct FakeRunner {
    results: Arc<Mutex<HashMap<TaskName, RunResult>>>,
    started: Arc<Mutex<Vec<TaskName>>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(self, task: &str, result: RunResult) -> Self {
        self.results.lock().unwrap().insert(task.to_string(), result);
        self
    }

    pub fn started(&self) -> Vec<TaskName> {
        self.started.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TaskRunner for FakeRunner {
    fn run_task(&self, task: Arc<Task>) -> RunFuture {
        let name = task.name().to_string();
        self.started.lock().unwrap().push(name.clone());
        let result = self
            .results
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .unwrap_or(RunResult::Success);
        let delay = self.delay;
        let in_flight = Arc::clone(&self.in_flight);
        let max_in_flight = Arc::clone(&self.max_in_flight);

        Box::pin(async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}

/// Batch executor for watch loop tests: records every batch and reports
/// each task as `Success` after an optional delay.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    batches: Arc<Mutex<Vec<Vec<TaskName>>>>,
    delay: Option<Duration>,
    result: Option<RunResult>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Result reported for every task (default `Success`).
    pub fn with_result(mut self, result: RunResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn batches(&self) -> Vec<Vec<TaskName>> {
        self.batches.lock().unwrap().clone()
    }
}

impl BatchExecutor for RecordingExecutor {
    fn execute_batch(&self, tasks: Vec<TaskName>) -> BatchFuture<'_> {
        Box::pin(async move {
            self.batches.lock().unwrap().push(tasks.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut report = RunReport::new(self.batches.lock().unwrap().len() as u64);
            let result = self.result.clone().unwrap_or(RunResult::Success);
            for task in tasks {
                report.insert(task, result.clone());
            }
            Ok(report)
        })
    }
}

/// Notification channel that records every notification, optionally
/// failing each call.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Each notification takes `delay` before it is recorded.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationChannel for RecordingChannel {
    fn notify<'a>(&'a self, note: &'a Notification) -> ChannelFuture<'a> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sent.lock().unwrap().push(note.clone());
            if self.fail {
                return Err(anyhow!("notification daemon unavailable"));
            }
            Ok(())
        })
    }
}

/// Reload channel that records the changed paths of every call.
#[derive(Clone, Default)]
pub struct RecordingReload {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RecordingReload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReloadChannel for RecordingReload {
    fn reload<'a>(&'a self, changed: &'a [String]) -> ChannelFuture<'a> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(changed.to_vec());
            Ok(())
        })
    }
}

/// Step that counts invocations and passes the asset through.
pub fn counting_step(name: &str) -> (Arc<dyn Step>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let step = FnStep::new(name, move |asset: Asset| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(asset)
    });
    (Arc::new(step), count)
}

/// Step that fails for inputs whose relative path contains `fragment`.
pub fn failing_on(fragment: &str) -> Arc<dyn Step> {
    let fragment = fragment.to_string();
    Arc::new(FnStep::new("flaky", move |asset: Asset| {
        if asset.rel.to_string_lossy().contains(&fragment) {
            Err(StepError::collaborator("flaky", format!("cannot process {}", asset.rel.display())))
        } else {
            Ok(asset)
        }
    }))
}

/// Step that uppercases text contents.
pub fn uppercase_step() -> Arc<dyn Step> {
    Arc::new(FnStep::new("uppercase", |mut asset: Asset| {
        let upper = asset.text().to_uppercase();
        asset.contents = upper.into_bytes();
        Ok(asset)
    }))
}
