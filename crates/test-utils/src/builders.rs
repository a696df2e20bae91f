#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use assetdag::config::{
    ConfigFile, ConfigSection, DefaultSection, NotifySection, RawConfigFile, ReloadSection,
    StepConfig, TaskConfig, WatchSection,
};
use assetdag::dag::TaskGraph;
use assetdag::step::Step;
use assetdag::task::{Destination, SourceSelector, Task};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                default: DefaultSection::default(),
                watch: WatchSection::default(),
                notify: NotifySection::default(),
                reload: ReloadSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.config.task.push(task);
        self
    }

    pub fn with_global_exclude(mut self, pattern: &str) -> Self {
        self.config.default.exclude.push(pattern.to_string());
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.config.config.concurrency = n;
        self
    }

    pub fn with_default_tasks(mut self, names: &[&str]) -> Self {
        self.config.config.default = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(name: &str, src: &str, dest: &str) -> Self {
        Self {
            task: TaskConfig {
                name: name.to_string(),
                src: src.to_string(),
                base: None,
                exclude: None,
                append_default_exclude: false,
                watch: None,
                dest: dest.to_string(),
                after: vec![],
                steps: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn step(mut self, step: StepConfig) -> Self {
        self.task.steps.push(step);
        self
    }

    pub fn watch(mut self, patterns: &[&str]) -> Self {
        self.task.watch = Some(patterns.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn exclude(mut self, patterns: &[&str]) -> Self {
        self.task.exclude = Some(patterns.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn append_default_exclude(mut self) -> Self {
        self.task.append_default_exclude = true;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// A task reading `<root>/src/<name>/**/*` and writing to `<root>/out/<name>`.
pub fn simple_task(root: &Path, name: &str, deps: &[&str]) -> Task {
    let selector = SourceSelector::new(root, format!("src/{name}/**/*"))
        .expect("valid selector pattern");
    let mut task = Task::new(name, selector, Destination::new(root.join("out").join(name)));
    for dep in deps {
        task = task.after(*dep);
    }
    task
}

/// A task over `pattern` with the given per-input steps.
pub fn task_with_steps(
    root: &Path,
    name: &str,
    pattern: &str,
    dest: &str,
    steps: Vec<Arc<dyn Step>>,
) -> Task {
    let selector = SourceSelector::new(root, pattern).expect("valid selector pattern");
    Task::new(name, selector, Destination::new(root.join(dest))).with_steps(steps)
}

/// Graph of `(name, deps)` pairs built with [`simple_task`] under `/p`.
pub fn graph_of(specs: &[(&str, &[&str])]) -> Arc<TaskGraph> {
    let root = Path::new("/p");
    let tasks = specs
        .iter()
        .map(|(name, deps)| simple_task(root, name, deps))
        .collect();
    Arc::new(TaskGraph::new(tasks).expect("valid task graph"))
}
