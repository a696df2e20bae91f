// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Incremental, dependency-ordered asset build pipeline.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Relative task paths resolve against
    /// its directory.
    #[arg(long, value_name = "PATH", default_value = "Assetdag.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Maximum number of tasks running at once (overrides `[config].concurrency`).
    #[arg(long, value_name = "N", global = true)]
    pub concurrency: Option<usize>,

    /// Parse + validate, print the task graph and execution order, but don't
    /// run anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build the given tasks (and their dependencies) once.
    Run {
        /// Tasks to build. Defaults to `[config].default`, or every task.
        tasks: Vec<String>,
    },
    /// Build once, then rebuild on file changes until Ctrl-C.
    Watch {
        /// Tasks to watch. Defaults to `[config].default`, or every task.
        tasks: Vec<String>,

        /// Skip the initial build.
        #[arg(long)]
        no_initial_build: bool,
    },
}

impl Command {
    pub fn tasks(&self) -> &[String] {
        match self {
            Command::Run { tasks } | Command::Watch { tasks, .. } => tasks,
        }
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::Run { tasks: Vec::new() }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
