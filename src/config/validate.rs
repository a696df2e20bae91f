// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile, StepConfig};
use crate::dag::graph::find_cycle;
use crate::errors::{AssetdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Run every structural check on a raw config.
///
/// Destination overlap and glob syntax are checked later, when the config is
/// turned into a [`crate::dag::TaskGraph`].
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_names(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_steps(cfg)?;
    validate_default_tasks(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(AssetdagError::ConfigError(
            "config must contain at least one [[task]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.concurrency == 0 {
        return Err(AssetdagError::ConfigError(
            "[config].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.config.input_concurrency == Some(0) {
        return Err(AssetdagError::ConfigError(
            "[config].input_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in cfg.task.iter() {
        if task.name.trim().is_empty() {
            return Err(AssetdagError::ConfigError(
                "task name must not be empty".to_string(),
            ));
        }
        if !seen.insert(task.name.as_str()) {
            return Err(AssetdagError::ConfigError(format!(
                "task '{}' is declared more than once",
                task.name
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let names: HashSet<&str> = cfg.task.iter().map(|t| t.name.as_str()).collect();
    for task in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == &task.name {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    task.name
                )));
            }
            if !names.contains(dep.as_str()) {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    task.name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_steps(cfg: &RawConfigFile) -> Result<()> {
    for task in cfg.task.iter() {
        let concat_count = task
            .steps
            .iter()
            .filter(|s| matches!(s, StepConfig::Concat { .. }))
            .count();
        if concat_count > 1 {
            return Err(AssetdagError::ConfigError(format!(
                "task '{}' has {} concat steps; at most one is allowed",
                task.name, concat_count
            )));
        }

        for step in task.steps.iter() {
            match step {
                StepConfig::PostProcessCss { processors } if processors.is_empty() => {
                    return Err(AssetdagError::ConfigError(format!(
                        "task '{}': post_process_css needs at least one processor",
                        task.name
                    )));
                }
                StepConfig::Concat { file, .. } if file.trim().is_empty() => {
                    return Err(AssetdagError::ConfigError(format!(
                        "task '{}': concat step needs a non-empty `file`",
                        task.name
                    )));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn validate_default_tasks(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.config.default.iter() {
        if !cfg.task.iter().any(|t| &t.name == name) {
            return Err(AssetdagError::ConfigError(format!(
                "[config].default references unknown task '{}'",
                name
            )));
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    let cycle = find_cycle(
        cfg.task.iter().map(|t| t.name.as_str()),
        cfg.task
            .iter()
            .flat_map(|t| t.after.iter().map(move |d| (d.as_str(), t.name.as_str()))),
    );
    match cycle {
        None => Ok(()),
        Some(name) => Err(AssetdagError::DagCycle(format!(
            "cycle detected in task graph involving task '{name}'"
        ))),
    }
}
