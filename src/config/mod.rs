// src/config/mod.rs

//! Configuration loading and validation for treewatch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate roots, exclusion patterns and tuning values (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, OutputSection, RawConfigFile, TuningSection, WatchSection};
pub use validate::{validate_exclusions, validate_options, validate_roots, validate_with};
