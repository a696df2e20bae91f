// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate structural invariants like DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigFile, ConfigSection, DefaultSection, NotifySection, RawConfigFile, ReloadSection,
    StepConfig, TaskConfig, WatchSection,
};
pub use validate::validate_config;
