// src/report/mod.rs

//! Result reporting.
//!
//! Every task result is printed for the operator and, if a notification
//! channel is configured, forwarded to it. Channel errors are logged and
//! swallowed: a broken notifier never changes a run's outcome.

pub mod reload;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{error, info, warn};

use crate::config::model::NotifySection;
use crate::engine::{Failure, RunResult};
use crate::exec::ShellCommand;

pub use reload::{CommandReload, ReloadChannel};

pub type ChannelFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// What gets sent to a notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub is_error: bool,
}

impl Notification {
    /// `None` for results that are not worth a desktop notification:
    /// skips, successes when `on_success` is off, and tasks blocked by a
    /// dependency (the dependency's own failure was already sent).
    pub fn for_result(task: &str, result: &RunResult, on_success: bool) -> Option<Self> {
        match result {
            RunResult::Success if on_success => Some(Self {
                title: format!("{task} task"),
                message: format!("{task} task complete!"),
                is_error: false,
            }),
            RunResult::Success | RunResult::Skipped => None,
            RunResult::Failed(Failure::DependencyFailed(_)) => None,
            RunResult::Failed(failure) => Some(Self {
                title: format!("{task} task"),
                message: format!("Error: {}", first_error(failure)),
                is_error: true,
            }),
        }
    }
}

fn first_error(failure: &Failure) -> String {
    match failure {
        Failure::Inputs(inputs) => inputs
            .first()
            .map(|f| f.error.clone())
            .unwrap_or_else(|| failure.to_string()),
        other => other.to_string(),
    }
}

pub trait NotificationChannel: Send + Sync {
    fn notify<'a>(&'a self, note: &'a Notification) -> ChannelFuture<'a>;
}

/// Runs a shell command per notification with `ASSETDAG_TITLE`,
/// `ASSETDAG_MESSAGE` and `ASSETDAG_LEVEL` (`info` or `error`) exported.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    cmd: String,
}

impl CommandChannel {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl NotificationChannel for CommandChannel {
    fn notify<'a>(&'a self, note: &'a Notification) -> ChannelFuture<'a> {
        Box::pin(async move {
            let level = if note.is_error { "error" } else { "info" };
            let out = ShellCommand::new(&self.cmd)
                .env("ASSETDAG_TITLE", &note.title)
                .env("ASSETDAG_MESSAGE", &note.message)
                .env("ASSETDAG_LEVEL", level)
                .run(&[])
                .await?;
            if !out.success {
                bail!("notify command exited with {}: {}", out.code, out.stderr_lossy());
            }
            Ok(())
        })
    }
}

/// Operator-facing lines for one task result.
pub fn format_result(task: &str, result: &RunResult) -> Vec<String> {
    match result {
        RunResult::Success => vec![format!("[assetdag] {task}: done")],
        RunResult::Skipped => vec![format!("[assetdag] {task}: up to date")],
        RunResult::Failed(Failure::Inputs(inputs)) => {
            let mut lines = vec![format!(
                "[assetdag] {task}: FAILED ({} input(s))",
                inputs.len()
            )];
            lines.extend(
                inputs
                    .iter()
                    .map(|f| format!("  - {}: {}", f.input.display(), f.error)),
            );
            lines
        }
        RunResult::Failed(failure) => vec![format!("[assetdag] {task}: FAILED ({failure})")],
    }
}

/// Prints results and forwards them to the optional channel.
#[derive(Clone, Default)]
pub struct Notifier {
    channel: Option<Arc<dyn NotificationChannel>>,
    on_success: bool,
    quiet: bool,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("channel", &self.channel.is_some())
            .field("on_success", &self.on_success)
            .field("quiet", &self.quiet)
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            channel: None,
            on_success: true,
            quiet: false,
        }
    }

    pub fn from_config(cfg: &NotifySection) -> Self {
        let mut notifier = Self::new();
        notifier.on_success = cfg.on_success;
        if let Some(cmd) = &cfg.cmd {
            notifier.channel = Some(Arc::new(CommandChannel::new(cmd)));
        }
        notifier
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn on_success(mut self, on_success: bool) -> Self {
        self.on_success = on_success;
        self
    }

    /// Suppress stdout output (tests).
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Print and log the result, then deliver its notification.
    pub async fn report(&self, task: &str, result: &RunResult) {
        if let Some(note) = self.announce(task, result) {
            self.deliver(task, &note).await;
        }
    }

    /// Print and log the result. Returns the notification still to be
    /// delivered, if a channel is configured and the result warrants one.
    pub fn announce(&self, task: &str, result: &RunResult) -> Option<Notification> {
        if !self.quiet {
            for line in format_result(task, result) {
                println!("{line}");
            }
        }
        match result {
            RunResult::Failed(failure) => error!(task, %failure, "task failed"),
            other => info!(task, result = other.label(), "task finished"),
        }

        if self.channel.is_none() {
            return None;
        }
        Notification::for_result(task, result, self.on_success)
    }

    pub async fn deliver(&self, task: &str, note: &Notification) {
        let Some(channel) = &self.channel else {
            return;
        };
        if let Err(e) = channel.notify(note).await {
            warn!(task, "notification channel failed: {e:#}");
        }
    }
}
