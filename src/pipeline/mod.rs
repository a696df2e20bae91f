// src/pipeline/mod.rs

//! Pipeline runner.
//!
//! Runs a task's steps over its stale inputs and writes the artifacts.
//! Inputs are processed concurrently (bounded by
//! [`PipelineOptions::input_concurrency`]); a failing input is recorded and
//! the others carry on, so one bad file never blocks the rest of the task.

pub mod bundle;
pub mod deporder;

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::engine::{Failure, InputFailure, RunResult};
use crate::errors::StepError;
use crate::fs::FileSystem;
use crate::step::{Asset, Step};
use crate::task::{Destination, SourceFile, Task};
use crate::types::OutputMode;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Maximum number of inputs of one task in flight at once.
    pub input_concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            input_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Run `task` over `stale_inputs`.
///
/// An empty input list yields [`RunResult::Skipped`] without invoking any
/// step. Otherwise the result is `Success` if every input (and the bundle,
/// for concatenating tasks) was written, or `Failed` listing each failed
/// input sorted by path.
pub async fn run_task(
    task: Arc<Task>,
    stale_inputs: Vec<SourceFile>,
    fs: Arc<dyn FileSystem>,
    options: PipelineOptions,
) -> RunResult {
    if stale_inputs.is_empty() {
        debug!(task = %task.name(), "no stale inputs; skipping");
        return RunResult::Skipped;
    }

    info!(
        task = %task.name(),
        inputs = stale_inputs.len(),
        steps = %task.describe_steps(),
        "running pipeline"
    );

    let mode = task.mode();
    let (assets, mut failures) = process_inputs(
        Arc::clone(&task),
        stale_inputs,
        Arc::clone(&fs),
        options,
        mode == OutputMode::PerFile,
    )
    .await;

    if mode == OutputMode::Bundle {
        if failures.is_empty() {
            if let Err(failure) = bundle::build_bundle(&task, assets, fs.as_ref()).await {
                failures.push(failure);
            }
        } else {
            info!(task = %task.name(), "inputs failed; bundle not written");
        }
    }

    if failures.is_empty() {
        RunResult::Success
    } else {
        failures.sort_by(|a, b| a.input.cmp(&b.input));
        for f in failures.iter() {
            error!(task = %task.name(), input = %f.input.display(), error = %f.error, "input failed");
        }
        RunResult::Failed(Failure::Inputs(failures))
    }
}

/// Read and transform every input. With `write_final` the finished asset is
/// written under the destination; otherwise it is returned for bundling.
///
/// Successful assets come back in selector order.
async fn process_inputs(
    task: Arc<Task>,
    inputs: Vec<SourceFile>,
    fs: Arc<dyn FileSystem>,
    options: PipelineOptions,
    write_final: bool,
) -> (Vec<Asset>, Vec<InputFailure>) {
    let semaphore = Arc::new(Semaphore::new(options.input_concurrency.max(1)));
    let mut outstanding: BTreeSet<usize> = (0..inputs.len()).collect();
    let mut set = JoinSet::new();

    for (idx, src) in inputs.iter().cloned().enumerate() {
        let task = Arc::clone(&task);
        let fs = Arc::clone(&fs);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => process_one(&task, &src, fs.as_ref(), write_final).await,
                Err(e) => Err(StepError::io(&src.path, e)),
            };
            (idx, result)
        });
    }

    let mut done: Vec<(usize, Asset)> = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, Ok(asset))) => {
                outstanding.remove(&idx);
                done.push((idx, asset));
            }
            Ok((idx, Err(e))) => {
                outstanding.remove(&idx);
                failures.push(InputFailure::new(inputs[idx].path.clone(), e.to_string()));
            }
            Err(e) => error!(task = %task.name(), "input worker panicked: {e}"),
        }
    }
    // Anything still outstanding belonged to a worker that panicked.
    for idx in outstanding {
        failures.push(InputFailure::new(
            inputs[idx].path.clone(),
            "step panicked".to_string(),
        ));
    }

    done.sort_by_key(|(idx, _)| *idx);
    (done.into_iter().map(|(_, a)| a).collect(), failures)
}

async fn process_one(
    task: &Task,
    src: &SourceFile,
    fs: &dyn FileSystem,
    write_final: bool,
) -> Result<Asset, StepError> {
    let contents = fs
        .read(&src.path)
        .map_err(|e| StepError::io(&src.path, format!("{e:#}")))?;
    let asset = Asset::new(src.path.clone(), src.rel.clone(), contents);

    let (asset, written) = apply_steps(task.steps(), asset, task.destination(), fs).await?;
    if write_final && !written {
        write_artifact(fs, task.destination(), &asset)?;
    }
    Ok(asset)
}

/// Apply `steps` in order, writing an artifact after each checkpoint step.
///
/// The returned flag tells whether the final asset was already written by a
/// trailing checkpoint.
pub(crate) async fn apply_steps(
    steps: &[Arc<dyn Step>],
    mut asset: Asset,
    dest: &Destination,
    fs: &dyn FileSystem,
) -> Result<(Asset, bool), StepError> {
    let mut written = false;
    for step in steps {
        asset = step.apply(asset).await?;
        written = false;
        if step.is_checkpoint() {
            write_artifact(fs, dest, &asset)?;
            written = true;
        }
    }
    Ok((asset, written))
}

pub(crate) fn write_artifact(
    fs: &dyn FileSystem,
    dest: &Destination,
    asset: &Asset,
) -> Result<(), StepError> {
    let path = dest.artifact(&asset.rel);
    fs.write_atomic(&path, &asset.contents)
        .map_err(|e| StepError::io(&path, format!("{e:#}")))?;
    debug!(artifact = %path.display(), bytes = asset.contents.len(), "artifact written");
    Ok(())
}
