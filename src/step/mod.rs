// src/step/mod.rs

//! Processing steps.
//!
//! A task's pipeline is an ordered list of [`Step`]s. Each step receives an
//! in-memory [`Asset`] and returns the transformed asset (or a
//! [`StepError`]). Steps never touch the destination directory themselves;
//! the pipeline runner owns all artifact writes.
//!
//! - [`external`] wraps black-box collaborators (image optimiser, stylesheet
//!   compiler, CSS processors, linter, minifier) run as shell commands.
//! - [`builtin`] holds the steps implemented in-process (`rename`, `emit`,
//!   closures).
//! - [`diagnostics`] parses `file:line:col: message` tool output.

pub mod builtin;
pub mod diagnostics;
pub mod external;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::config::model::StepConfig;
use crate::errors::StepError;

pub use builtin::{Emit, FnStep, Rename};
pub use diagnostics::{Diagnostic, parse_diagnostics};
pub use external::{
    CommandStep, CompileStylesheet, LintScript, MinifyScript, OptimizeImage, PostProcessCss,
};

/// A unit of content flowing through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Absolute path of the source this asset was read from. For bundles this
    /// is the first input in concatenation order.
    pub source: PathBuf,
    /// Output path relative to the task's destination directory.
    pub rel: PathBuf,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn new(source: impl Into<PathBuf>, rel: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            rel: rel.into(),
            contents,
        }
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }
}

pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Asset, StepError>> + Send + 'a>>;

/// One transformation stage of a task.
pub trait Step: Send + Sync + fmt::Debug {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Output path this step gives an asset whose current path is `rel`.
    ///
    /// Must agree with what [`Step::apply`] does to `Asset::rel`; the
    /// staleness tracker uses it to locate artifacts without running steps.
    fn output_path(&self, rel: &Path) -> PathBuf {
        rel.to_path_buf()
    }

    /// Whether the runner should write the asset as an artifact after this
    /// step (in addition to the final artifact).
    fn is_checkpoint(&self) -> bool {
        false
    }

    fn apply(&self, asset: Asset) -> StepFuture<'_>;
}

/// Build a step from its configuration.
///
/// Returns `None` for `concat`, which is not a step but splits the list into
/// per-input and per-bundle halves (see [`crate::task::Task::from_config`]).
pub fn from_config(cfg: &StepConfig) -> Option<Arc<dyn Step>> {
    let step: Arc<dyn Step> = match cfg {
        StepConfig::OptimizeImage { cmd } => Arc::new(OptimizeImage::new(cmd)),
        StepConfig::CompileStylesheet { cmd } => Arc::new(CompileStylesheet::new(cmd)),
        StepConfig::PostProcessCss { processors } => {
            Arc::new(PostProcessCss::new(processors.clone()))
        }
        StepConfig::LintScript {
            cmd,
            fail_on_diagnostics,
        } => Arc::new(LintScript::new(cmd, *fail_on_diagnostics)),
        StepConfig::MinifyScript { cmd } => Arc::new(MinifyScript::new(cmd)),
        StepConfig::Command { cmd, name } => {
            Arc::new(CommandStep::new(name.as_deref().unwrap_or("command"), cmd))
        }
        StepConfig::Rename {
            prefix,
            suffix,
            extension,
        } => Arc::new(Rename::new(
            prefix.clone(),
            suffix.clone(),
            extension.clone(),
        )),
        StepConfig::Emit => Arc::new(Emit),
        StepConfig::Concat { .. } => return None,
    };
    Some(step)
}
