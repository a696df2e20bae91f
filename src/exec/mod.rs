// src/exec/mod.rs

//! Process execution layer.
//!
//! Collaborators, notification hooks and the live-reload hook are all shell
//! commands. This module runs them with `tokio::process::Command` and hands
//! back captured output; interpreting exit codes is up to the caller.

pub mod command;

pub use command::{ShellCommand, ShellOutput, shell_quote};
