// tests/watch_loop.rs

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

use assetdag::config::WatchSection;
use assetdag::engine::{Failure, RunResult};
use assetdag::errors::Result;
use assetdag::fs::FileSystem;
use assetdag::fs::mock::MockFileSystem;
use assetdag::watch::{WatchBindings, WatchEvent, WatchLoop, WatchOptions, WatchSummary};

use crate::common::builders::graph_of;
use crate::common::fakes::{RecordingExecutor, RecordingReload};
use crate::common::init_tracing;

const DEBOUNCE: Duration = Duration::from_millis(100);

fn bindings(watch: &WatchSection) -> WatchBindings {
    let graph = graph_of(&[("css", &[]), ("images", &[]), ("site", &["css"])]);
    WatchBindings::from_graph(&graph, Path::new("/p"), watch, None).unwrap()
}

fn options() -> WatchOptions {
    WatchOptions {
        debounce: DEBOUNCE,
        use_hash: false,
    }
}

fn changed(path: &str) -> WatchEvent {
    WatchEvent::Changed(PathBuf::from(path))
}

struct Harness {
    tx: mpsc::UnboundedSender<WatchEvent>,
    handle: JoinHandle<Result<WatchSummary>>,
}

impl Harness {
    fn start(watch_loop: WatchLoop<RecordingExecutor>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(watch_loop.run(rx));
        Self { tx, handle }
    }

    fn send(&self, event: WatchEvent) {
        self.tx.send(event).unwrap();
    }

    async fn stop(self) -> WatchSummary {
        self.tx.send(WatchEvent::Stop).unwrap();
        self.handle.await.unwrap().unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_runs_one_batch() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch_loop = WatchLoop::new("/p", bindings(&WatchSection::default()), executor.clone(), fs, options());
    let harness = Harness::start(watch_loop);

    harness.send(changed("/p/src/images/x.png"));
    sleep(Duration::from_millis(30)).await;
    harness.send(changed("/p/src/css/a.scss"));
    sleep(Duration::from_millis(30)).await;
    harness.send(changed("/p/src/css/b.scss"));
    sleep(Duration::from_millis(500)).await;

    let summary = harness.stop().await;
    assert_eq!(executor.batches(), vec![vec!["css".to_string(), "images".to_string()]]);
    assert_eq!(summary.runs, 1);
}

#[tokio::test(start_paused = true)]
async fn debounce_window_is_not_extended_by_later_events() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch_loop = WatchLoop::new("/p", bindings(&WatchSection::default()), executor.clone(), fs, options());
    let harness = Harness::start(watch_loop);

    // One event every 60ms: with a sliding window nothing would ever run.
    harness.send(changed("/p/src/css/a.scss"));
    for _ in 0..3 {
        sleep(Duration::from_millis(60)).await;
        harness.send(changed("/p/src/css/a.scss"));
    }
    sleep(Duration::from_millis(500)).await;

    let summary = harness.stop().await;
    assert!(summary.runs >= 2, "expected at least two batches, got {summary:?}");
}

#[tokio::test(start_paused = true)]
async fn changes_during_a_run_start_a_new_batch() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(500)));
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch_loop = WatchLoop::new("/p", bindings(&WatchSection::default()), executor.clone(), fs, options());
    let harness = Harness::start(watch_loop);

    harness.send(changed("/p/src/css/a.scss"));
    sleep(Duration::from_millis(300)).await;
    assert_eq!(executor.batches().len(), 1);
    harness.send(changed("/p/src/images/y.png"));
    sleep(Duration::from_millis(2000)).await;

    let summary = harness.stop().await;
    assert_eq!(
        executor.batches(),
        vec![vec!["css".to_string()], vec!["images".to_string()]]
    );
    assert_eq!(summary.runs, 2);
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_in_flight_batch() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(500)));
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch_loop = WatchLoop::new("/p", bindings(&WatchSection::default()), executor.clone(), fs, options());
    let harness = Harness::start(watch_loop);

    let start = Instant::now();
    harness.send(changed("/p/src/css/a.scss"));
    sleep(Duration::from_millis(150)).await;
    assert_eq!(executor.batches().len(), 1);

    let summary = harness.stop().await;
    assert!(start.elapsed() >= Duration::from_millis(600));
    assert_eq!(summary.runs, 1);
    assert_eq!(summary.failed_runs, 0);
}

#[tokio::test(start_paused = true)]
async fn outputs_ignored_and_unrelated_paths_do_nothing() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch = WatchSection {
        ignore: vec!["**/*.swp".to_string()],
        ..WatchSection::default()
    };
    let watch_loop = WatchLoop::new("/p", bindings(&watch), executor.clone(), fs, options());
    let harness = Harness::start(watch_loop);

    harness.send(changed("/p/out/css/a.css"));
    harness.send(changed("/p/src/css/.a.scss.swp"));
    harness.send(changed("/p/README.md"));
    harness.send(changed("/elsewhere/src/css/a.scss"));
    sleep(Duration::from_millis(500)).await;

    let summary = harness.stop().await;
    assert!(executor.batches().is_empty());
    assert_eq!(summary, WatchSummary::default());
}

#[tokio::test(start_paused = true)]
async fn reload_only_paths_reload_without_a_batch() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let reload = Arc::new(RecordingReload::new());
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch = WatchSection {
        reload_on: vec!["templates/**/*.html".to_string()],
        ..WatchSection::default()
    };
    let watch_loop = WatchLoop::new("/p", bindings(&watch), executor.clone(), fs, options())
        .with_reload(reload.clone());
    let harness = Harness::start(watch_loop);

    harness.send(changed("/p/templates/index.html"));
    sleep(Duration::from_millis(500)).await;

    let summary = harness.stop().await;
    assert!(executor.batches().is_empty());
    assert_eq!(reload.calls(), vec![vec!["templates/index.html".to_string()]]);
    assert_eq!(summary.reloads, 1);
}

#[tokio::test(start_paused = true)]
async fn successful_batch_triggers_reload_with_changed_paths() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let reload = Arc::new(RecordingReload::new());
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch_loop = WatchLoop::new("/p", bindings(&WatchSection::default()), executor.clone(), fs, options())
        .with_reload(reload.clone());
    let harness = Harness::start(watch_loop);

    harness.send(changed("/p/src/css/a.scss"));
    harness.send(changed("/p/src/css/b.scss"));
    sleep(Duration::from_millis(500)).await;

    let summary = harness.stop().await;
    assert_eq!(
        reload.calls(),
        vec![vec!["src/css/a.scss".to_string(), "src/css/b.scss".to_string()]]
    );
    assert_eq!(summary.reloads, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_batch_does_not_reload() {
    init_tracing();
    let failed = RunResult::Failed(Failure::Task("boom".to_string()));
    let executor = Arc::new(RecordingExecutor::new().with_result(failed));
    let reload = Arc::new(RecordingReload::new());
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch_loop = WatchLoop::new("/p", bindings(&WatchSection::default()), executor.clone(), fs, options())
        .with_reload(reload.clone());
    let harness = Harness::start(watch_loop);

    harness.send(changed("/p/src/css/a.scss"));
    sleep(Duration::from_millis(500)).await;

    let summary = harness.stop().await;
    assert_eq!(executor.batches().len(), 1);
    assert!(reload.calls().is_empty());
    assert_eq!(summary.failed_runs, 1);
    assert_eq!(summary.reloads, 0);
}

#[tokio::test(start_paused = true)]
async fn unchanged_content_is_dropped_with_use_hash() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let mock = Arc::new(MockFileSystem::new());
    mock.add_file("/p/src/css/a.scss", "a { }");
    let fs: Arc<dyn FileSystem> = mock.clone();

    let mut watch_loop = WatchLoop::new(
        "/p",
        bindings(&WatchSection::default()),
        executor.clone(),
        fs,
        WatchOptions {
            debounce: DEBOUNCE,
            use_hash: true,
        },
    );
    watch_loop.prime_hashes([Path::new("/p/src/css/a.scss")]);
    let harness = Harness::start(watch_loop);

    mock.touch("/p/src/css/a.scss");
    harness.send(changed("/p/src/css/a.scss"));
    sleep(Duration::from_millis(500)).await;
    assert!(executor.batches().is_empty());

    mock.add_file("/p/src/css/a.scss", "a { color: red }");
    harness.send(changed("/p/src/css/a.scss"));
    sleep(Duration::from_millis(500)).await;

    let summary = harness.stop().await;
    assert_eq!(executor.batches(), vec![vec!["css".to_string()]]);
    assert_eq!(summary.runs, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_saves_of_one_file_run_once() {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let watch_loop = WatchLoop::new("/p", bindings(&WatchSection::default()), executor.clone(), fs, options());
    let harness = Harness::start(watch_loop);

    for _ in 0..3 {
        harness.send(changed("/p/src/css/style.scss"));
        sleep(Duration::from_millis(20)).await;
    }
    sleep(Duration::from_millis(500)).await;

    let summary = harness.stop().await;
    assert_eq!(executor.batches(), vec![vec!["css".to_string()]]);
    assert_eq!(summary.runs, 1);
}
