// src/report/reload.rs

use anyhow::bail;

use crate::exec::ShellCommand;
use crate::report::ChannelFuture;

/// Live-reload hook, poked by the watch loop after a batch that changed
/// something (or when a `reload_on` path changed).
pub trait ReloadChannel: Send + Sync {
    /// `changed` holds root-relative paths of the files that triggered it.
    fn reload<'a>(&'a self, changed: &'a [String]) -> ChannelFuture<'a>;
}

/// Runs a shell command with `ASSETDAG_CHANGED` set to the changed paths,
/// one per line.
#[derive(Debug, Clone)]
pub struct CommandReload {
    cmd: String,
}

impl CommandReload {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl ReloadChannel for CommandReload {
    fn reload<'a>(&'a self, changed: &'a [String]) -> ChannelFuture<'a> {
        Box::pin(async move {
            let out = ShellCommand::new(&self.cmd)
                .env("ASSETDAG_CHANGED", changed.join("\n"))
                .run(&[])
                .await?;
            if !out.success {
                bail!("reload command exited with {}: {}", out.code, out.stderr_lossy());
            }
            Ok(())
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_reload_command_is_an_error() {
        let reload = CommandReload::new("exit 7");
        let err = reload.reload(&["index.html".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("7"), "{err}");
    }
}
