// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate every invariant before anything runs (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, project_root_for, DEFAULT_CONFIG_FILE};
pub use model::{
    ConfigFile, ConfigSection, ExtraServerConfig, OutputSection, RawConfigFile, ServerSection,
    StageConfig, StageKind, TaskConfig, WatchBindingConfig,
};
