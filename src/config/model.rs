// src/config/model.rs

use serde::Deserialize;

use crate::types::ConcatOrder;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// concurrency = 4
/// default = ["css", "js"]
///
/// [watch]
/// debounce_ms = 200
/// reload_on = ["**/*.php", "**/*.html"]
///
/// [[task]]
/// name = "images"
/// src = "library/_src/images/**/*"
/// dest = "library/images"
/// steps = [{ kind = "optimize_image", cmd = "imagemin" }]
/// ```
///
/// Tasks are an array of tables so that declaration order is preserved; it
/// is used as the scheduling tie-break.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub default: DefaultSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub notify: NotifySection,

    #[serde(default)]
    pub reload: ReloadSection,

    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// Validated configuration. Only constructible through
/// `ConfigFile::try_from(RawConfigFile)` (see `config::validate`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub default: DefaultSection,
    pub watch: WatchSection,
    pub notify: NotifySection,
    pub reload: ReloadSection,
    pub task: Vec<TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            default: raw.default,
            watch: raw.watch,
            notify: raw.notify,
            reload: raw.reload,
            task: raw.task,
        }
    }

    pub fn tasks(&self) -> &[TaskConfig] {
        &self.task
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.iter().find(|t| t.name == name)
    }

    /// Task names to run when none are given on the command line.
    ///
    /// Falls back to every task in declaration order when `[config].default`
    /// is empty.
    pub fn default_tasks(&self) -> Vec<String> {
        if self.config.default.is_empty() {
            self.task.iter().map(|t| t.name.clone()).collect()
        } else {
            self.config.default.clone()
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of tasks running at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum number of inputs of a single task processed at the same time.
    ///
    /// Defaults to the available parallelism of the machine.
    #[serde(default)]
    pub input_concurrency: Option<usize>,

    /// Composite default task list (`assetdag run` without arguments).
    #[serde(default)]
    pub default: Vec<String>,
}

fn default_concurrency() -> usize {
    4
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            input_concurrency: None,
            default: Vec::new(),
        }
    }
}

impl ConfigSection {
    pub fn effective_input_concurrency(&self) -> usize {
        self.input_concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultSection {
    /// Exclude patterns applied to tasks that do not override them.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Debounce window for change events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Ignore change events whose file content hash did not change.
    #[serde(default)]
    pub use_hash: bool,

    /// Patterns that only trigger a live reload (no task).
    #[serde(default)]
    pub reload_on: Vec<String>,

    /// Patterns never reported by the watcher (e.g. `.git/**`).
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    200
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            use_hash: false,
            reload_on: Vec::new(),
            ignore: Vec::new(),
        }
    }
}

/// `[notify]` section: operator notification channel.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifySection {
    /// Shell command run per notification. Receives `ASSETDAG_TITLE`,
    /// `ASSETDAG_MESSAGE` and `ASSETDAG_LEVEL` in its environment.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Also notify on successful tasks, not only on failures.
    #[serde(default = "default_true")]
    pub on_success: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            cmd: None,
            on_success: true,
        }
    }
}

/// `[reload]` section: live-reload hook used in watch mode.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReloadSection {
    /// Shell command run after a rebuild or a `reload_on` change;
    /// `ASSETDAG_CHANGED` lists the changed paths, one per line.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub name: String,

    /// Source glob, relative to the config directory.
    pub src: String,

    /// Base directory for relative output paths. Defaults to the glob-free
    /// prefix of `src`.
    #[serde(default)]
    pub base: Option<String>,

    /// Task-local exclude patterns. If `None`, `[default].exclude` is used.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    /// If true, `[default].exclude` is appended to `exclude`.
    #[serde(default)]
    pub append_default_exclude: bool,

    /// Patterns that re-trigger this task in watch mode. Defaults to `[src]`.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Destination directory, relative to the config directory.
    pub dest: String,

    /// Tasks that must finish (Success or Skipped) before this one runs.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl TaskConfig {
    pub fn effective_watch(&self) -> Vec<String> {
        match &self.watch {
            Some(list) => list.clone(),
            None => vec![self.src.clone()],
        }
    }

    pub fn effective_exclude(&self, defaults: &DefaultSection) -> Vec<String> {
        match (&self.exclude, self.append_default_exclude) {
            (Some(list), true) => {
                let mut combined = list.clone();
                combined.extend(defaults.exclude.iter().cloned());
                combined
            }
            (Some(list), false) => list.clone(),
            (None, _) => defaults.exclude.clone(),
        }
    }

    pub fn has_concat(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s, StepConfig::Concat { .. }))
    }
}

/// One entry of a task's `steps` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepConfig {
    OptimizeImage {
        cmd: String,
    },
    CompileStylesheet {
        cmd: String,
    },
    PostProcessCss {
        processors: Vec<String>,
    },
    LintScript {
        cmd: String,
        #[serde(default)]
        fail_on_diagnostics: bool,
    },
    MinifyScript {
        cmd: String,
    },
    Command {
        cmd: String,
        #[serde(default)]
        name: Option<String>,
    },
    Rename {
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
        #[serde(default)]
        extension: Option<String>,
    },
    Emit,
    Concat {
        file: String,
        #[serde(default)]
        order: ConcatOrder,
    },
}
