// tests/staleness.rs

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use assetdag::fs::FileSystem;
use assetdag::fs::mock::MockFileSystem;
use assetdag::stale::StalenessTracker;
use assetdag::step::{Emit, Rename};
use assetdag::task::{Bundle, Destination, SourceSelector, Task};
use assetdag::types::ConcatOrder;

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn image_task() -> Task {
    Task::new(
        "images",
        SourceSelector::new("/p", "images/**/*.png").unwrap(),
        Destination::new("/p/dist/images"),
    )
}

fn rels(files: &[assetdag::task::SourceFile]) -> Vec<PathBuf> {
    files.iter().map(|f| f.rel.clone()).collect()
}

#[test]
fn only_inputs_newer_than_their_artifact_are_stale() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file_at("/p/images/a.png", "a", at(100));
    fs.add_file_at("/p/images/b.png", "b", at(300));
    fs.add_file_at("/p/images/c.png", "c", at(100));
    fs.add_file_at("/p/dist/images/a.png", "a", at(200));
    fs.add_file_at("/p/dist/images/b.png", "b", at(200));

    let tracker = StalenessTracker::new(fs);
    let stale = tracker.stale(&image_task()).unwrap();

    // b is newer than its artifact, c has none.
    assert_eq!(rels(&stale), vec![PathBuf::from("b.png"), PathBuf::from("c.png")]);
}

#[test]
fn staleness_is_read_only() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/images/a.png", "a");
    fs.add_file("/p/images/icons/b.png", "b");
    let before = fs.files();

    let tracker = StalenessTracker::new(fs.clone());
    let first = tracker.stale(&image_task()).unwrap();
    let second = tracker.stale(&image_task()).unwrap();

    assert_eq!(first, second);
    assert_eq!(rels(&first), vec![PathBuf::from("a.png"), PathBuf::from("icons/b.png")]);
    assert_eq!(fs.files(), before);
}

#[test]
fn deleting_an_artifact_makes_its_input_stale_again() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/images/a.png", "a");
    fs.add_file("/p/images/b.png", "b");
    fs.add_file("/p/dist/images/a.png", "a");
    fs.add_file("/p/dist/images/b.png", "b");

    let tracker = StalenessTracker::new(fs.clone());
    assert!(tracker.stale(&image_task()).unwrap().is_empty());

    fs.remove_file(Path::new("/p/dist/images/a.png")).unwrap();
    let stale = tracker.stale(&image_task()).unwrap();
    assert_eq!(rels(&stale), vec![PathBuf::from("a.png")]);
}

#[test]
fn every_emitted_artifact_must_be_fresh() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/scss/style.scss", "a { }");
    fs.add_file("/p/css/style.css", "a {}");

    let task = Task::new(
        "css",
        SourceSelector::new("/p", "scss/style.scss").unwrap(),
        Destination::new("/p/css"),
    )
    .with_steps(vec![
        Arc::new(Rename::extension("css")),
        Arc::new(Emit),
        Arc::new(Rename::suffix(".min")),
    ]);

    let tracker = StalenessTracker::new(fs.clone());
    // The minified artifact is missing.
    assert_eq!(tracker.stale(&task).unwrap().len(), 1);

    fs.add_file("/p/css/style.min.css", "a{}");
    assert!(tracker.stale(&task).unwrap().is_empty());

    fs.touch("/p/scss/style.scss");
    assert_eq!(tracker.stale(&task).unwrap().len(), 1);
}

#[test]
fn bundle_is_all_or_nothing() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/js/a.js", "var a;");
    fs.add_file("/p/js/b.js", "var b;");
    fs.add_file("/p/build/js/scripts.js", "var a;\nvar b;");

    let task = Task::new(
        "js",
        SourceSelector::new("/p", "js/*.js").unwrap(),
        Destination::new("/p/build/js"),
    )
    .with_bundle(Bundle {
        file: PathBuf::from("scripts.js"),
        order: ConcatOrder::Path,
        steps: Vec::new(),
    });

    let tracker = StalenessTracker::new(fs.clone());
    assert!(tracker.stale(&task).unwrap().is_empty());

    fs.touch("/p/js/b.js");
    let stale = tracker.stale(&task).unwrap();
    assert_eq!(rels(&stale), vec![PathBuf::from("a.js"), PathBuf::from("b.js")]);
}

#[test]
fn newer_watched_file_makes_every_input_stale() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/scss/style.scss", "@import 'vars';");
    fs.add_file("/p/scss/_vars.scss", "$red: #f00;");
    fs.add_file("/p/css/style.css", "a {}");

    let task = Task::new(
        "css",
        SourceSelector::new("/p", "scss/style.scss").unwrap(),
        Destination::new("/p/css"),
    )
    .with_step(Arc::new(Rename::extension("css")))
    .with_watch(vec!["scss/style.scss".to_string(), "scss/**/*".to_string()]);

    let tracker = StalenessTracker::new(fs.clone());
    assert!(tracker.stale(&task).unwrap().is_empty());

    fs.touch("/p/scss/_vars.scss");
    let stale = tracker.stale(&task).unwrap();
    assert_eq!(rels(&stale), vec![PathBuf::from("style.scss")]);
}

#[test]
fn watched_files_under_the_destination_are_ignored() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/site/src/page.md", "# hi");
    fs.add_file("/p/site/out/page.md", "# hi");
    fs.add_file("/p/site/out/notes.md", "later");

    let task = Task::new(
        "pages",
        SourceSelector::new("/p", "site/src/*.md").unwrap(),
        Destination::new("/p/site/out"),
    )
    .with_watch(vec!["site/**/*.md".to_string()]);

    assert!(StalenessTracker::new(fs).stale(&task).unwrap().is_empty());
}

#[test]
fn deleting_a_bundle_input_makes_the_bundle_stale() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/js/a.js", "var a;");
    fs.add_file("/p/js/b.js", "var b;");
    fs.add_file("/p/build/all.js", "var a;\nvar b;");

    let task = Task::new(
        "js",
        SourceSelector::new("/p", "js/*.js").unwrap(),
        Destination::new("/p/build"),
    )
    .with_bundle(Bundle {
        file: PathBuf::from("all.js"),
        order: ConcatOrder::Path,
        steps: Vec::new(),
    });

    let tracker = StalenessTracker::new(fs.clone());
    assert!(tracker.stale(&task).unwrap().is_empty());

    fs.remove_file(Path::new("/p/js/b.js")).unwrap();
    let stale = tracker.stale(&task).unwrap();
    assert_eq!(rels(&stale), vec![PathBuf::from("a.js")]);
}

#[test]
fn bundle_written_inside_the_source_tree_stays_fresh() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/a.js", "var a;");
    fs.add_file("/p/lib/b.js", "var b;");
    fs.add_file("/p/build/all.js", "var a;\nvar b;");

    let task = Task::new(
        "js",
        SourceSelector::new("/p", "**/*.js")
            .unwrap()
            .with_excludes(&["build/**".to_string()])
            .unwrap(),
        Destination::new("/p/build"),
    )
    .with_bundle(Bundle {
        file: PathBuf::from("all.js"),
        order: ConcatOrder::Path,
        steps: Vec::new(),
    });

    let tracker = StalenessTracker::new(fs.clone());
    assert!(tracker.stale(&task).unwrap().is_empty());

    fs.add_file("/p/build/all.js", "var a;\nvar b;");
    assert!(tracker.stale(&task).unwrap().is_empty());
}

#[test]
fn excluded_and_unmatched_files_are_never_stale() {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/images/a.png", "a");
    fs.add_file("/p/images/notes.txt", "n");
    fs.add_file("/p/images/raw/big.png", "b");

    let task = Task::new(
        "images",
        SourceSelector::new("/p", "images/**/*.png")
            .unwrap()
            .with_excludes(&["images/raw/**".to_string()])
            .unwrap(),
        Destination::new("/p/dist/images"),
    );

    let stale = StalenessTracker::new(fs).stale(&task).unwrap();
    assert_eq!(rels(&stale), vec![PathBuf::from("a.png")]);
}
