// tests/config_errors.rs

mod common;

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use assetdag::config::{load_and_validate, load_from_str};
use assetdag::dag::TaskGraph;
use assetdag::errors::AssetdagError;

use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder, simple_task};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn dag_cycle_returns_structured_error() {
    let file = write_config(
        r#"
[[task]]
name = "A"
src = "a/*"
dest = "out/a"
after = ["B"]

[[task]]
name = "B"
src = "b/*"
dest = "out/b"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(AssetdagError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('A') || msg.contains('B'));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn unknown_dependency_returns_config_error() {
    let file = write_config(
        r#"
[[task]]
name = "A"
src = "a/*"
dest = "out/a"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(AssetdagError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn duplicate_and_empty_names_are_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("css", "scss/*.scss", "css").build())
        .with_task(TaskConfigBuilder::new("css", "less/*.less", "css2").build())
        .raw();
    let err = assetdag::config::ConfigFile::try_from(raw).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("more than once"), "{err}");

    let raw = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("  ", "scss/*.scss", "css").build())
        .raw();
    assert!(matches!(
        assetdag::config::ConfigFile::try_from(raw),
        Err(AssetdagError::ConfigError(_))
    ));
}

#[test]
fn zero_concurrency_is_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_concurrency(0)
        .with_task(TaskConfigBuilder::new("a", "a/*", "out/a").build())
        .raw();
    let err = assetdag::config::ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("concurrency"), "{err}");
}

#[test]
fn unknown_step_kind_is_a_toml_error() {
    let result = load_from_str(
        r#"
[[task]]
name = "a"
src = "a/*"
dest = "out/a"
steps = [{ kind = "transmogrify" }]
"#,
    );
    assert!(matches!(result, Err(AssetdagError::TomlError(_))));
}

#[test]
fn overlapping_destinations_are_rejected_by_graph() {
    let cfg = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("site", "src/**/*", "build").build())
        .with_task(TaskConfigBuilder::new("css", "scss/*.scss", "build/css").build())
        .build();

    match TaskGraph::from_config(&cfg, Path::new("/p")) {
        Err(AssetdagError::ConfigError(msg)) => {
            assert!(msg.contains("overlapping destinations"), "{msg}");
        }
        other => panic!("expected overlap error, got {other:?}"),
    }
}

#[test]
fn programmatic_cycle_is_rejected_by_graph() {
    let root = Path::new("/p");
    let tasks = vec![
        simple_task(root, "a", &["c"]),
        simple_task(root, "b", &["a"]),
        simple_task(root, "c", &["b"]),
    ];
    assert!(matches!(
        TaskGraph::new(tasks),
        Err(AssetdagError::DagCycle(_))
    ));
}

#[test]
fn invalid_glob_is_a_config_error() {
    let cfg = ConfigFileBuilder::new()
        .with_task(TaskConfigBuilder::new("a", "src/[*.js", "out").build())
        .build();
    assert!(matches!(
        TaskGraph::from_config(&cfg, Path::new("/p")),
        Err(AssetdagError::ConfigError(_))
    ));
}
