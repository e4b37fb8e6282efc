//! # modelkit-core
//!
//! Core types shared by every modelkit crate: the error enum, the settings
//! system and its loaders, tracing setup, and a handful of string helpers.
//! This crate has no modelkit dependencies.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Model-layer settings
//! - [`settings_loader`] - Loading settings from TOML/JSON and the environment
//! - [`logging`] - Tracing-based logging integration
//! - [`utils`] - String helpers (`snake_case`, `studly_case`, table prefixes)

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use error::{ModelError, ModelResult};
pub use settings::Settings;
