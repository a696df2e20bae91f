// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::errors::{AssetdagError, Result};
use crate::task::Task;

/// Internal node structure: the task plus its immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    task: Arc<Task>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskName>,
}

/// The validated set of tasks and their dependency edges.
///
/// Built once at startup and shared (behind an `Arc`) by the engine and the
/// watch loop. Construction fails with a configuration error if the tasks do
/// not form a DAG or if two tasks would write into the same directory tree.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Nodes in declaration order.
    nodes: Vec<DagNode>,
    index: HashMap<TaskName, usize>,
}

impl TaskGraph {
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        validate_tasks(&tasks)?;

        let mut index = HashMap::new();
        let mut nodes: Vec<DagNode> = Vec::with_capacity(tasks.len());
        for (i, task) in tasks.into_iter().enumerate() {
            index.insert(task.name().to_string(), i);
            nodes.push(DagNode {
                task: Arc::new(task),
                dependents: Vec::new(),
            });
        }

        // Second pass: populate dependents based on deps.
        for i in 0..nodes.len() {
            let name = nodes[i].task.name().to_string();
            let deps = nodes[i].task.deps().to_vec();
            for dep in deps {
                if let Some(&d) = index.get(&dep) {
                    nodes[d].dependents.push(name.clone());
                }
            }
        }

        Ok(Self { nodes, index })
    }

    /// Build the graph from a validated [`ConfigFile`], resolving relative
    /// paths against `root`.
    pub fn from_config(cfg: &ConfigFile, root: &Path) -> Result<Self> {
        let tasks = cfg
            .tasks()
            .iter()
            .map(|t| Task::from_config(t, &cfg.default, root))
            .collect::<Result<Vec<_>>>()?;
        Self::new(tasks)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.nodes.iter().map(|n| &n.task)
    }

    /// All task names in declaration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.task.name())
    }

    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.index.get(name).map(|&i| &self.nodes[i].task)
    }

    /// Declaration index of a task; used as the scheduling tie-break.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Immediate dependencies of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.task(name).map(|t| t.deps()).unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[TaskName] {
        self.index
            .get(name)
            .map(|&i| self.nodes[i].dependents.as_slice())
            .unwrap_or(&[])
    }

    /// The requested tasks plus all their transitive dependencies.
    pub fn closure(&self, requested: &[TaskName]) -> Result<HashSet<TaskName>> {
        let mut seen: HashSet<TaskName> = HashSet::new();
        let mut stack: Vec<TaskName> = Vec::new();
        for name in requested {
            if !self.index.contains_key(name) {
                return Err(AssetdagError::TaskNotFound(name.clone()));
            }
            stack.push(name.clone());
        }
        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            stack.extend(self.dependencies_of(&name).iter().cloned());
        }
        Ok(seen)
    }

    /// Topological order of the closure of `requested` (Kahn's algorithm,
    /// ties broken by declaration order).
    pub fn execution_order(&self, requested: &[TaskName]) -> Result<Vec<TaskName>> {
        let closure = self.closure(requested)?;

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for name in closure.iter() {
            in_degree.insert(name.as_str(), self.dependencies_of(name).len());
        }

        let mut ready: BinaryHeap<Reverse<usize>> = closure
            .iter()
            .filter(|n| in_degree.get(n.as_str()) == Some(&0))
            .filter_map(|n| self.position(n))
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(closure.len());
        while let Some(Reverse(i)) = ready.pop() {
            let name = self.nodes[i].task.name();
            order.push(name.to_string());
            for dependent in self.nodes[i].dependents.iter() {
                if let Some(d) = in_degree.get_mut(dependent.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        if let Some(pos) = self.position(dependent) {
                            ready.push(Reverse(pos));
                        }
                    }
                }
            }
        }
        Ok(order)
    }
}

fn validate_tasks(tasks: &[Task]) -> Result<()> {
    let mut names: HashSet<&str> = HashSet::new();
    for task in tasks {
        if task.name().trim().is_empty() {
            return Err(AssetdagError::ConfigError(
                "task name must not be empty".to_string(),
            ));
        }
        if !names.insert(task.name()) {
            return Err(AssetdagError::ConfigError(format!(
                "task '{}' is declared more than once",
                task.name()
            )));
        }
    }

    for task in tasks {
        for dep in task.deps() {
            if dep == task.name() {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' cannot depend on itself",
                    task.name()
                )));
            }
            if !names.contains(dep.as_str()) {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}'",
                    task.name(),
                    dep
                )));
            }
        }
    }

    let cycle = find_cycle(
        tasks.iter().map(|t| t.name()),
        tasks
            .iter()
            .flat_map(|t| t.deps().iter().map(move |d| (d.as_str(), t.name()))),
    );
    if let Some(name) = cycle {
        return Err(AssetdagError::DagCycle(format!(
            "cycle detected in task graph involving task '{name}'"
        )));
    }

    for (i, a) in tasks.iter().enumerate() {
        for b in tasks.iter().skip(i + 1) {
            if a.destination().overlaps(b.destination()) {
                return Err(AssetdagError::ConfigError(format!(
                    "tasks '{}' and '{}' have overlapping destinations ({} / {})",
                    a.name(),
                    b.name(),
                    a.destination().dir().display(),
                    b.destination().dir().display()
                )));
            }
        }
    }

    Ok(())
}

/// A task on a dependency cycle, if there is one. Edges run from a
/// dependency to the task that depends on it.
pub(crate) fn find_cycle<'a>(
    nodes: impl IntoIterator<Item = &'a str>,
    edges: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Option<&'a str> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for node in nodes {
        graph.add_node(node);
    }
    for (dep, task) in edges {
        graph.add_edge(dep, task, ());
    }
    toposort(&graph, None).err().map(|cycle| cycle.node_id())
}
