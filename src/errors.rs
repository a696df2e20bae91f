// src/errors.rs

//! Crate-wide error types.
//!
//! [`AssetdagError`] covers everything that aborts a command (bad
//! configuration, unreadable config file). [`StepError`] is recorded per
//! input by the pipeline and never aborts a run on its own.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetdagError {
    /// True for errors that stem from an invalid task graph or config file.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AssetdagError::ConfigError(_)
                | AssetdagError::DagCycle(_)
                | AssetdagError::TaskNotFound(_)
                | AssetdagError::TomlError(_)
        )
    }
}

/// Failure of a single step on a single input.
#[derive(Error, Debug)]
pub enum StepError {
    /// An external tool exited unsuccessfully or could not be spawned.
    #[error("{tool}: {message}")]
    Collaborator { tool: String, message: String },

    /// A compiler reported a syntax error with a source location.
    #[error("{tool}: {file}:{line}:{column}: {message}")]
    Syntax {
        tool: String,
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// Linting produced diagnostics and the step is configured to fail on them.
    #[error("{tool}: {count} lint diagnostic(s)")]
    Lint { tool: String, count: usize },

    /// Reading a source or writing an artifact failed.
    #[error("io error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl StepError {
    pub fn collaborator(tool: impl Into<String>, message: impl Into<String>) -> Self {
        StepError::Collaborator {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StepError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;
