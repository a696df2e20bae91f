// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod stale;
pub mod step;
pub mod task;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::loader::{config_root_dir, load_and_validate};
use crate::config::model::ConfigFile;
use crate::dag::TaskGraph;
use crate::engine::{Engine, PipelineTaskRunner, RunReport, TaskName};
use crate::errors::{AssetdagError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::PipelineOptions;
use crate::report::{CommandReload, Notifier};
use crate::watch::{WatchBindings, WatchEvent, WatchLoop, WatchOptions};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, builds the task graph and engine, then
/// either runs the requested tasks once or keeps watching. Returns `false`
/// if any task failed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root = config_root_dir(&config_path);
    let graph = Arc::new(TaskGraph::from_config(&cfg, &root)?);

    let command = args.command.clone().unwrap_or_default();
    let requested = requested_tasks(&cfg, command.tasks());
    let order = graph.execution_order(&requested)?;

    if args.dry_run {
        print_dry_run(&cfg, &graph, &requested, &order);
        return Ok(true);
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let concurrency = args.concurrency.unwrap_or(cfg.config.concurrency).max(1);
    let runner = Arc::new(PipelineTaskRunner::new(
        Arc::clone(&fs),
        PipelineOptions {
            input_concurrency: cfg.config.effective_input_concurrency(),
        },
    ));
    let notifier = Arc::new(Notifier::from_config(&cfg.notify));
    let engine = Arc::new(Engine::new(Arc::clone(&graph), runner, notifier, concurrency));

    match command {
        Command::Run { .. } => {
            let report = engine.execute(&requested).await?;
            print_summary(&report);
            Ok(!report.has_failures())
        }
        Command::Watch {
            no_initial_build, ..
        } => {
            if !no_initial_build {
                let report = engine.execute(&requested).await?;
                print_summary(&report);
            }
            watch(&cfg, &root, &graph, engine, fs, &requested).await?;
            Ok(true)
        }
    }
}

/// Task names given on the command line, else `[config].default`, else all.
pub fn requested_tasks(cfg: &ConfigFile, cli_tasks: &[String]) -> Vec<TaskName> {
    if cli_tasks.is_empty() {
        cfg.default_tasks()
    } else {
        cli_tasks.to_vec()
    }
}

async fn watch(
    cfg: &ConfigFile,
    root: &Path,
    graph: &Arc<TaskGraph>,
    engine: Arc<Engine>,
    fs: Arc<dyn FileSystem>,
    requested: &[TaskName],
) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel::<WatchEvent>();
    let watcher = crate::watch::spawn_watcher(root, tx.clone())?;
    let root = watcher.root().clone();

    // Ctrl-C → stop after the in-flight batch.
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(WatchEvent::Stop);
        });
    }

    let scope = graph.closure(requested)?;
    let bindings = WatchBindings::from_graph(graph, &root, &cfg.watch, Some(&scope))
        .map_err(AssetdagError::Other)?;
    for binding in bindings.bindings() {
        debug!(patterns = ?binding.patterns(), tasks = ?binding.tasks(), "watch binding");
    }

    let options = WatchOptions {
        debounce: Duration::from_millis(cfg.watch.debounce_ms),
        use_hash: cfg.watch.use_hash,
    };
    let mut watch_loop = WatchLoop::new(root.clone(), bindings, engine, Arc::clone(&fs), options);
    if let Some(cmd) = &cfg.reload.cmd {
        watch_loop = watch_loop.with_reload(Arc::new(CommandReload::new(cmd)));
    }
    if options.use_hash {
        let mut sources = Vec::new();
        for task in graph.tasks().filter(|t| scope.contains(t.name())) {
            match task.selector().resolve(fs.as_ref()) {
                Ok(files) => sources.extend(files.into_iter().map(|f| f.path)),
                Err(e) => warn!(task = %task.name(), "could not list sources for hashing: {e:#}"),
            }
        }
        watch_loop.prime_hashes(sources.iter().map(PathBuf::as_path));
    }

    println!("[assetdag] watching {} (Ctrl-C to stop)", root.display());
    let summary = watch_loop.run(rx).await?;
    info!(
        runs = summary.runs,
        failed_runs = summary.failed_runs,
        reloads = summary.reloads,
        "watch session ended"
    );
    drop(watcher);
    Ok(())
}

fn print_summary(report: &RunReport) {
    let failed = report.failed_tasks();
    if failed.is_empty() {
        println!("[assetdag] {} task(s) finished", report.len());
    } else {
        println!(
            "[assetdag] {} task(s) finished, failed: {}",
            report.len(),
            failed.join(", ")
        );
    }
}

/// Print tasks, dependencies, steps and the execution order.
fn print_dry_run(cfg: &ConfigFile, graph: &TaskGraph, requested: &[TaskName], order: &[TaskName]) {
    println!("assetdag dry-run");
    println!("  config.concurrency = {}", cfg.config.concurrency);
    println!(
        "  config.input_concurrency = {}",
        cfg.config.effective_input_concurrency()
    );
    println!("  watch.debounce_ms = {}", cfg.watch.debounce_ms);
    println!();

    println!("tasks ({}):", graph.len());
    for task in graph.tasks() {
        println!("  - {}", task.name());
        println!("      src: {}", task.selector().pattern());
        println!("      dest: {}", task.destination().dir().display());
        if !task.steps().is_empty() || task.bundle().is_some() {
            println!("      steps: {}", task.describe_steps());
        }
        if !task.deps().is_empty() {
            println!("      after: {:?}", task.deps());
        }
        if !task.selector().excludes().is_empty() {
            println!("      exclude: {:?}", task.selector().excludes());
        }
        if task.watch_patterns() != [task.selector().pattern().to_string()] {
            println!("      watch: {:?}", task.watch_patterns());
        }
    }
    println!();
    println!("requested: {}", requested.join(", "));
    println!("execution order: {}", order.join(" -> "));

    debug!("dry-run complete (no execution)");
}
