// src/step/external.rs

//! Collaborator steps backed by external tools.
//!
//! Every tool is a shell command line. The asset bytes are written to its
//! stdin and its stdout becomes the new asset contents. `{input}` in the
//! command line is replaced with the absolute source path, which is also
//! exported as `ASSETDAG_INPUT`.

use tracing::warn;

use crate::errors::StepError;
use crate::exec::{ShellCommand, ShellOutput};
use crate::step::diagnostics::parse_diagnostics;
use crate::step::{Asset, Step, StepFuture};

/// Run `cmd` as a stdin → stdout filter over `asset`.
async fn filter(tool: &str, cmd: &str, asset: &Asset) -> Result<ShellOutput, StepError> {
    ShellCommand::new(cmd)
        .with_input(&asset.source)
        .run(&asset.contents)
        .await
        .map_err(|e| StepError::collaborator(tool, format!("{e:#}")))
}

fn exit_message(out: &ShellOutput) -> String {
    let stderr = out.stderr_lossy();
    if stderr.is_empty() {
        format!("exited with status {}", out.code)
    } else {
        stderr
    }
}

async fn run_filter(tool: &str, cmd: &str, mut asset: Asset) -> Result<Asset, StepError> {
    let out = filter(tool, cmd, &asset).await?;
    if !out.success {
        return Err(StepError::collaborator(tool, exit_message(&out)));
    }
    asset.contents = out.stdout;
    Ok(asset)
}

/// `optimizeImage(bytes) -> bytes`.
#[derive(Debug, Clone)]
pub struct OptimizeImage {
    cmd: String,
}

impl OptimizeImage {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl Step for OptimizeImage {
    fn name(&self) -> &str {
        "optimize_image"
    }

    fn apply(&self, asset: Asset) -> StepFuture<'_> {
        Box::pin(run_filter(self.name(), &self.cmd, asset))
    }
}

/// `compileStyleSheet(sourcePath) -> css`.
///
/// The compiler usually reads the file itself (`sass {input}`) so that
/// relative imports resolve. Failures carrying a `file:line:col` location are
/// reported as [`StepError::Syntax`].
#[derive(Debug, Clone)]
pub struct CompileStylesheet {
    cmd: String,
}

impl CompileStylesheet {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl Step for CompileStylesheet {
    fn name(&self) -> &str {
        "compile_stylesheet"
    }

    fn apply(&self, mut asset: Asset) -> StepFuture<'_> {
        Box::pin(async move {
            let out = filter(self.name(), &self.cmd, &asset).await?;
            if !out.success {
                let stderr = out.stderr_lossy();
                let stdout = out.stdout_lossy();
                let located = parse_diagnostics(&stderr)
                    .into_iter()
                    .chain(parse_diagnostics(&stdout))
                    .next();
                return Err(match located {
                    Some(d) => StepError::Syntax {
                        tool: self.name().to_string(),
                        file: d.file,
                        line: d.line,
                        column: d.column,
                        message: d.message,
                    },
                    None => StepError::collaborator(self.name(), exit_message(&out)),
                });
            }
            asset.contents = out.stdout;
            Ok(asset)
        })
    }
}

/// `postProcessCss(css, processorChain) -> css`: each processor is a filter
/// command applied in order.
#[derive(Debug, Clone)]
pub struct PostProcessCss {
    processors: Vec<String>,
}

impl PostProcessCss {
    pub fn new(processors: Vec<String>) -> Self {
        Self { processors }
    }
}

impl Step for PostProcessCss {
    fn name(&self) -> &str {
        "post_process_css"
    }

    fn apply(&self, asset: Asset) -> StepFuture<'_> {
        Box::pin(async move {
            let mut asset = asset;
            for processor in self.processors.iter() {
                asset = run_filter(self.name(), processor, asset).await?;
            }
            Ok(asset)
        })
    }
}

/// `minifyScript(text) -> text`.
#[derive(Debug, Clone)]
pub struct MinifyScript {
    cmd: String,
}

impl MinifyScript {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl Step for MinifyScript {
    fn name(&self) -> &str {
        "minify_script"
    }

    fn apply(&self, asset: Asset) -> StepFuture<'_> {
        Box::pin(run_filter(self.name(), &self.cmd, asset))
    }
}

/// Generic filter command.
#[derive(Debug, Clone)]
pub struct CommandStep {
    name: String,
    cmd: String,
}

impl CommandStep {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
        }
    }
}

impl Step for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, asset: Asset) -> StepFuture<'_> {
        Box::pin(run_filter(&self.name, &self.cmd, asset))
    }
}

/// `lintScript(text) -> diagnostics`.
///
/// Content passes through unchanged. Diagnostics are printed and logged; they
/// only fail the input when `fail_on_diagnostics` is set.
#[derive(Debug, Clone)]
pub struct LintScript {
    cmd: String,
    fail_on_diagnostics: bool,
}

impl LintScript {
    pub fn new(cmd: impl Into<String>, fail_on_diagnostics: bool) -> Self {
        Self {
            cmd: cmd.into(),
            fail_on_diagnostics,
        }
    }
}

impl Step for LintScript {
    fn name(&self) -> &str {
        "lint_script"
    }

    fn apply(&self, asset: Asset) -> StepFuture<'_> {
        Box::pin(async move {
            let out = filter(self.name(), &self.cmd, &asset).await?;
            let mut diagnostics = parse_diagnostics(&out.stdout_lossy());
            diagnostics.extend(parse_diagnostics(&out.stderr_lossy()));

            // Linters exit non-zero when they report something; only treat
            // the exit status as a failure if nothing parseable came out.
            if !out.success && diagnostics.is_empty() {
                return Err(StepError::collaborator(self.name(), exit_message(&out)));
            }

            for d in diagnostics.iter() {
                println!("[assetdag] lint {d}");
                warn!(
                    source = %asset.source.display(),
                    file = %d.file,
                    line = d.line,
                    column = d.column,
                    "{}",
                    d.message
                );
            }

            if self.fail_on_diagnostics && !diagnostics.is_empty() {
                return Err(StepError::Lint {
                    tool: self.name().to_string(),
                    count: diagnostics.len(),
                });
            }
            Ok(asset)
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn asset(contents: &str) -> Asset {
        Asset::new("/src/app.js", "app.js", contents.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn filter_command_replaces_contents() {
        let step = CommandStep::new("upper", "tr a-z A-Z");
        let out = step.apply(asset("abc")).await.unwrap();
        assert_eq!(out.contents, b"ABC");
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let step = MinifyScript::new("echo 'Unexpected token' >&2; exit 3");
        let err = step.apply(asset("x")).await.unwrap_err();
        assert!(err.to_string().contains("Unexpected token"), "{err}");
    }

    #[tokio::test]
    async fn compiler_error_with_location_becomes_syntax_error() {
        let step = CompileStylesheet::new("echo 'style.scss:4:2: expected \";\"' >&2; exit 1");
        match step.apply(asset("")).await {
            Err(StepError::Syntax { line, column, .. }) => {
                assert_eq!((line, column), (4, 2));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lint_is_non_fatal_unless_configured() {
        let cmd = "echo 'app.js:1:5: Missing semicolon.'; exit 2";
        let lenient = LintScript::new(cmd, false);
        let out = lenient.apply(asset("var a = 1")).await.unwrap();
        assert_eq!(out.contents, b"var a = 1");

        let strict = LintScript::new(cmd, true);
        assert!(matches!(
            strict.apply(asset("var a = 1")).await,
            Err(StepError::Lint { count: 1, .. })
        ));
    }

    #[tokio::test]
    async fn post_processors_run_in_order() {
        let step = PostProcessCss::new(vec!["sed s/a/b/".into(), "sed s/b/c/".into()]);
        let out = step.apply(asset("a")).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&out.contents).trim(), "c");
    }
}
