// src/task/mod.rs

//! Task definitions.
//!
//! A [`Task`] is pure data: where its sources come from, which steps they go
//! through and where the artifacts land. Running a task is the job of
//! [`crate::pipeline`]; deciding *when* it runs is the job of
//! [`crate::dag`] and [`crate::engine`].

pub mod selector;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::model::{DefaultSection, StepConfig, TaskConfig};
use crate::engine::TaskName;
use crate::errors::{AssetdagError, Result};
use crate::step::{self, Step};
use crate::types::{ConcatOrder, OutputMode};

pub use selector::{SelectorWalk, SourceFile, SourceSelector};

/// Directory a task writes its artifacts into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    dir: PathBuf,
}

impl Destination {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of the artifact with the given relative path.
    pub fn artifact(&self, rel: &Path) -> PathBuf {
        self.dir.join(rel)
    }

    /// True if one destination is the same as, or nested inside, the other.
    pub fn overlaps(&self, other: &Destination) -> bool {
        self.dir.starts_with(&other.dir) || other.dir.starts_with(&self.dir)
    }
}

/// Concatenation stage of a bundle task.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Output file name of the concatenated bundle, relative to the destination.
    pub file: PathBuf,
    pub order: ConcatOrder,
    /// Steps applied once to the concatenated bundle.
    pub steps: Vec<Arc<dyn Step>>,
}

/// A named unit of build work.
#[derive(Clone)]
pub struct Task {
    name: TaskName,
    selector: SourceSelector,
    steps: Vec<Arc<dyn Step>>,
    bundle: Option<Bundle>,
    dest: Destination,
    deps: Vec<TaskName>,
    watch: Vec<String>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<&str> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("steps", &steps)
            .field("bundle", &self.bundle.as_ref().map(|b| &b.file))
            .field("dest", &self.dest)
            .field("deps", &self.deps)
            .finish()
    }
}

impl Task {
    pub fn new(name: impl Into<TaskName>, selector: SourceSelector, dest: Destination) -> Self {
        let watch = vec![selector.pattern().to_string()];
        Self {
            name: name.into(),
            selector,
            steps: Vec::new(),
            bundle: None,
            dest,
            deps: Vec::new(),
            watch,
        }
    }

    pub fn with_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_steps(mut self, steps: Vec<Arc<dyn Step>>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_bundle(mut self, bundle: Bundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn after(mut self, dep: impl Into<TaskName>) -> Self {
        self.deps.push(dep.into());
        self
    }

    pub fn with_watch(mut self, patterns: Vec<String>) -> Self {
        self.watch = patterns;
        self
    }

    /// Build a task from its `[[task]]` entry. Relative paths are resolved
    /// against `root`.
    pub fn from_config(cfg: &TaskConfig, defaults: &DefaultSection, root: &Path) -> Result<Self> {
        let mut selector = SourceSelector::new(root, cfg.src.clone())
            .and_then(|s| s.with_excludes(&cfg.effective_exclude(defaults)))
            .map_err(|e| {
                AssetdagError::ConfigError(format!("task '{}': {e:#}", cfg.name))
            })?;
        if let Some(base) = &cfg.base {
            selector = selector.with_base(base);
        }

        let mut steps: Vec<Arc<dyn Step>> = Vec::new();
        let mut bundle: Option<Bundle> = None;
        for step_cfg in cfg.steps.iter() {
            if let StepConfig::Concat { file, order } = step_cfg {
                if steps.iter().any(|s| s.is_checkpoint()) {
                    return Err(AssetdagError::ConfigError(format!(
                        "task '{}': `emit` is not allowed before `concat`",
                        cfg.name
                    )));
                }
                bundle = Some(Bundle {
                    file: PathBuf::from(file),
                    order: *order,
                    steps: Vec::new(),
                });
                continue;
            }
            let Some(step) = step::from_config(step_cfg) else {
                continue;
            };
            match bundle.as_mut() {
                Some(b) => b.steps.push(step),
                None => steps.push(step),
            }
        }

        let mut task = Task::new(cfg.name.clone(), selector, Destination::new(root.join(&cfg.dest)))
            .with_steps(steps)
            .with_watch(cfg.effective_watch());
        task.bundle = bundle;
        task.deps = cfg.after.clone();
        Ok(task)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    pub fn bundle(&self) -> Option<&Bundle> {
        self.bundle.as_ref()
    }

    pub fn destination(&self) -> &Destination {
        &self.dest
    }

    pub fn deps(&self) -> &[TaskName] {
        &self.deps
    }

    /// Patterns (relative to the selector root) that re-trigger this task.
    pub fn watch_patterns(&self) -> &[String] {
        &self.watch
    }

    pub fn mode(&self) -> OutputMode {
        if self.bundle.is_some() {
            OutputMode::Bundle
        } else {
            OutputMode::PerFile
        }
    }

    /// Relative paths of every artifact produced for one input: emitted
    /// checkpoints in step order, then the final artifact.
    pub fn artifacts_for(&self, rel: &Path) -> Vec<PathBuf> {
        fold_artifacts(&self.steps, rel)
    }

    /// Relative paths of every artifact produced by the bundle stage, or an
    /// empty list for per-file tasks.
    pub fn bundle_artifacts(&self) -> Vec<PathBuf> {
        match &self.bundle {
            Some(b) => fold_artifacts(&b.steps, &b.file),
            None => Vec::new(),
        }
    }

    /// Human-readable step chain, e.g. `compile_stylesheet -> rename -> emit`.
    pub fn describe_steps(&self) -> String {
        let mut names: Vec<String> = self.steps.iter().map(|s| s.name().to_string()).collect();
        if let Some(b) = &self.bundle {
            names.push(format!("concat({})", b.file.display()));
            names.extend(b.steps.iter().map(|s| s.name().to_string()));
        }
        names.join(" -> ")
    }
}

fn fold_artifacts(steps: &[Arc<dyn Step>], rel: &Path) -> Vec<PathBuf> {
    let mut artifacts = Vec::new();
    let mut current = rel.to_path_buf();
    for step in steps {
        current = step.output_path(&current);
        if step.is_checkpoint() {
            artifacts.push(current.clone());
        }
    }
    if artifacts.last() != Some(&current) {
        artifacts.push(current);
    }
    artifacts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;

    #[test]
    fn css_task_produces_plain_and_minified_artifacts() {
        let raw = load_from_str(
            r#"
[[task]]
name = "css"
src = "scss/style.scss"
dest = "css"
steps = [
  { kind = "compile_stylesheet", cmd = "sass {input}" },
  { kind = "rename", extension = "css" },
  { kind = "emit" },
  { kind = "rename", suffix = ".min" },
]
"#,
        )
        .unwrap();
        let task = Task::from_config(&raw.task[0], &raw.default, Path::new("/p")).unwrap();

        assert_eq!(task.mode(), OutputMode::PerFile);
        assert_eq!(
            task.artifacts_for(Path::new("style.scss")),
            vec![PathBuf::from("style.css"), PathBuf::from("style.min.css")]
        );
        assert_eq!(task.destination().dir(), Path::new("/p/css"));
        assert_eq!(task.watch_patterns(), &["scss/style.scss".to_string()]);
    }

    #[test]
    fn concat_splits_steps_into_bundle_stage() {
        let raw = load_from_str(
            r#"
[[task]]
name = "js"
src = "js/**/*.js"
dest = "build/js"
steps = [
  { kind = "lint_script", cmd = "jshint -" },
  { kind = "concat", file = "scripts.js", order = "requires" },
  { kind = "rename", suffix = ".min" },
  { kind = "minify_script", cmd = "uglifyjs" },
]
"#,
        )
        .unwrap();
        let task = Task::from_config(&raw.task[0], &raw.default, Path::new("/p")).unwrap();

        assert_eq!(task.mode(), OutputMode::Bundle);
        assert_eq!(task.steps().len(), 1);
        let bundle = task.bundle().unwrap();
        assert_eq!(bundle.order, ConcatOrder::Requires);
        assert_eq!(bundle.steps.len(), 2);
        assert_eq!(task.bundle_artifacts(), vec![PathBuf::from("scripts.min.js")]);
        assert_eq!(
            task.describe_steps(),
            "lint_script -> concat(scripts.js) -> rename -> minify_script"
        );
    }

    #[test]
    fn emit_before_concat_is_rejected() {
        let raw = load_from_str(
            r#"
[[task]]
name = "js"
src = "js/*.js"
dest = "build/js"
steps = [{ kind = "emit" }, { kind = "concat", file = "all.js" }]
"#,
        )
        .unwrap();
        let err = Task::from_config(&raw.task[0], &raw.default, Path::new("/p")).unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(_)));
    }

    #[test]
    fn destinations_overlap_when_nested() {
        let a = Destination::new("/p/build");
        let b = Destination::new("/p/build/css");
        let c = Destination::new("/p/build-js");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }
}
