// src/step/builtin.rs

//! Steps implemented in-process.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::StepError;
use crate::step::{Asset, Step, StepFuture};

/// Change the output file name: `prefix + stem + suffix + "." + extension`.
///
/// `extension = ""` drops the extension.
#[derive(Debug, Clone, Default)]
pub struct Rename {
    prefix: Option<String>,
    suffix: Option<String>,
    extension: Option<String>,
}

impl Rename {
    pub fn new(prefix: Option<String>, suffix: Option<String>, extension: Option<String>) -> Self {
        Self {
            prefix,
            suffix,
            extension,
        }
    }

    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
            ..Self::default()
        }
    }

    pub fn extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
            ..Self::default()
        }
    }
}

impl Step for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn output_path(&self, rel: &Path) -> PathBuf {
        let stem = rel
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = match &self.extension {
            Some(e) => Some(e.trim_start_matches('.').to_string()),
            None => rel.extension().map(|e| e.to_string_lossy().to_string()),
        };

        let mut name = format!(
            "{}{}{}",
            self.prefix.as_deref().unwrap_or(""),
            stem,
            self.suffix.as_deref().unwrap_or("")
        );
        if let Some(ext) = ext.filter(|e| !e.is_empty()) {
            name.push('.');
            name.push_str(&ext);
        }
        rel.with_file_name(name)
    }

    fn apply(&self, mut asset: Asset) -> StepFuture<'_> {
        asset.rel = self.output_path(&asset.rel);
        Box::pin(async move { Ok(asset) })
    }
}

/// Write the asset as it is at this point of the pipeline, then continue.
#[derive(Debug, Clone, Copy, Default)]
pub struct Emit;

impl Step for Emit {
    fn name(&self) -> &str {
        "emit"
    }

    fn is_checkpoint(&self) -> bool {
        true
    }

    fn apply(&self, asset: Asset) -> StepFuture<'_> {
        Box::pin(async move { Ok(asset) })
    }
}

type StepFn = dyn Fn(Asset) -> Result<Asset, StepError> + Send + Sync;

/// A synchronous closure used as a step.
pub struct FnStep {
    name: String,
    f: Box<StepFn>,
}

impl FnStep {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Asset) -> Result<Asset, StepError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl fmt::Debug for FnStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Step for FnStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, asset: Asset) -> StepFuture<'_> {
        let result = (self.f)(asset);
        Box::pin(async move { result })
    }
}
