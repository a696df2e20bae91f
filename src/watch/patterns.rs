// src/watch/patterns.rs

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::model::WatchSection;
use crate::dag::TaskGraph;
use crate::engine::TaskName;
use crate::task::selector::{build_globset, to_slash};

/// Compiled watch patterns of one or more tasks.
///
/// Tasks whose watch patterns and excludes are identical share a binding.
#[derive(Clone)]
pub struct WatchBinding {
    patterns: Vec<String>,
    excludes: Vec<String>,
    include: GlobSet,
    exclude: Option<GlobSet>,
    tasks: Vec<TaskName>,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("patterns", &self.patterns)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl WatchBinding {
    pub fn new(patterns: Vec<String>, excludes: Vec<String>, task: TaskName) -> Result<Self> {
        let include = build_globset(&patterns)
            .with_context(|| format!("building watch globset for task {task}"))?;
        let exclude = if excludes.is_empty() {
            None
        } else {
            Some(
                build_globset(&excludes)
                    .with_context(|| format!("building exclude globset for task {task}"))?,
            )
        };
        Ok(Self {
            patterns,
            excludes,
            include,
            exclude,
            tasks: vec![task],
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn tasks(&self) -> &[TaskName] {
        &self.tasks
    }

    /// `rel_path` is relative to the project root with `/` separators.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(rel_path),
            None => true,
        }
    }
}

/// What a changed path asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub tasks: Vec<TaskName>,
    pub reload: bool,
}

/// Every binding of a watch session, plus the reload-only and ignore sets.
#[derive(Debug, Clone)]
pub struct WatchBindings {
    bindings: Vec<WatchBinding>,
    reload_on: Option<GlobSet>,
    ignore: Option<GlobSet>,
    /// Destination directories relative to the root. Changes under them are
    /// artifacts being written and never trigger tasks.
    outputs: Vec<String>,
}

impl WatchBindings {
    /// Bindings for the tasks of `graph` (all of them, or those in `only`),
    /// in declaration order.
    pub fn from_graph(
        graph: &TaskGraph,
        root: &Path,
        watch: &WatchSection,
        only: Option<&HashSet<TaskName>>,
    ) -> Result<Self> {
        let mut bindings: Vec<WatchBinding> = Vec::new();
        let mut outputs = Vec::new();

        for task in graph.tasks() {
            if let Ok(rel) = task.destination().dir().strip_prefix(root) {
                outputs.push(to_slash(rel));
            }
            if only.is_some_and(|set| !set.contains(task.name())) {
                continue;
            }
            let patterns = task.watch_patterns().to_vec();
            let excludes = task.selector().excludes().to_vec();
            match bindings
                .iter_mut()
                .find(|b| b.patterns == patterns && b.excludes == excludes)
            {
                Some(shared) => shared.tasks.push(task.name().to_string()),
                None => bindings.push(WatchBinding::new(
                    patterns,
                    excludes,
                    task.name().to_string(),
                )?),
            }
        }

        let optional_set = |patterns: &[String], what: &str| -> Result<Option<GlobSet>> {
            if patterns.is_empty() {
                return Ok(None);
            }
            Ok(Some(
                build_globset(patterns).with_context(|| format!("building {what} globset"))?,
            ))
        };

        Ok(Self {
            bindings,
            reload_on: optional_set(&watch.reload_on, "reload_on")?,
            ignore: optional_set(&watch.ignore, "ignore")?,
            outputs,
        })
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    pub fn is_ignored(&self, rel_path: &str) -> bool {
        self.ignore.as_ref().is_some_and(|set| set.is_match(rel_path))
    }

    fn is_output(&self, rel_path: &str) -> bool {
        self.outputs
            .iter()
            .filter(|dir| !dir.is_empty())
            .any(|dir| rel_path == dir || rel_path.starts_with(&format!("{dir}/")))
    }

    /// Tasks (deduplicated) and reload interest for a changed path.
    pub fn resolve(&self, rel_path: &str) -> Resolution {
        let mut resolution = Resolution::default();
        if self.is_ignored(rel_path) {
            return resolution;
        }
        resolution.reload = self
            .reload_on
            .as_ref()
            .is_some_and(|set| set.is_match(rel_path));
        if self.is_output(rel_path) {
            return resolution;
        }
        for binding in self.bindings.iter().filter(|b| b.matches(rel_path)) {
            for task in binding.tasks() {
                if !resolution.tasks.contains(task) {
                    resolution.tasks.push(task.clone());
                }
            }
        }
        resolution
    }
}

/// Path relative to `root` with `/` separators, or `None` if outside it.
pub fn relative_to_root(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(to_slash)
}
