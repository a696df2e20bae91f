// src/exec/command.rs

//! Running external collaborators as shell commands.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Captured result of a finished shell command.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub success: bool,
    pub code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ShellOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// A shell command line plus the environment it runs with.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    line: String,
    env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            env: Vec::new(),
        }
    }

    /// Replace every `{input}` placeholder with the quoted path and export it
    /// as `ASSETDAG_INPUT`.
    pub fn with_input(mut self, input: &Path) -> Self {
        let path = input.to_string_lossy().to_string();
        self.line = self.line.replace("{input}", &shell_quote(&path));
        self.env.push(("ASSETDAG_INPUT".to_string(), path));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Run the command, feeding `stdin` to it and collecting stdout/stderr.
    ///
    /// A non-zero exit status is *not* an error here; callers decide what a
    /// failing exit means for their collaborator.
    pub async fn run(&self, stdin: &[u8]) -> Result<ShellOutput> {
        debug!(cmd = %self.line, bytes = stdin.len(), "spawning collaborator");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.line);
            c
        };

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in self.env.iter() {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning `{}`", self.line))?;

        // Feed stdin from a separate task so a tool that writes a lot of
        // output before draining its input cannot deadlock us. Dropping the
        // handle closes the pipe.
        if let Some(mut pipe) = child.stdin.take() {
            let input = stdin.to_vec();
            let line = self.line.clone();
            tokio::spawn(async move {
                if let Err(e) = pipe.write_all(&input).await {
                    // Tools that take their input from `{input}` never read stdin.
                    debug!(cmd = %line, error = %e, "collaborator did not consume stdin");
                }
            });
        }

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for `{}`", self.line))?;

        let code = output.status.code().unwrap_or(-1);
        info!(
            cmd = %self.line,
            exit_code = code,
            success = output.status.success(),
            "collaborator exited"
        );

        Ok(ShellOutput {
            success: output.status.success(),
            code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Quote a string for safe inclusion in a shell command line.
pub fn shell_quote(s: &str) -> String {
    if cfg!(windows) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_placeholder_is_quoted_and_exported() {
        let cmd = ShellCommand::new("sass {input}").with_input(Path::new("/tmp/it's.scss"));
        if !cfg!(windows) {
            assert_eq!(cmd.line(), "sass '/tmp/it'\\''s.scss'");
        }
        assert!(cmd.env.iter().any(|(k, v)| k == "ASSETDAG_INPUT" && v == "/tmp/it's.scss"));
    }
}
