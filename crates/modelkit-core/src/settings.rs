//! Settings for the model layer.
//!
//! [`Settings`] holds the defaults a model registry hands to every class it
//! defines (date storage format, page size, attribute key casing,
//! timestamps) plus the logging configuration. Settings are plain values;
//! load them with [`settings_loader`](crate::settings_loader) and pass them
//! to the registry that owns your model classes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The complete set of model-layer settings.
///
/// # Examples
///
/// ```
/// use modelkit_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.date_format, "%Y-%m-%d %H:%M:%S");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log filter (e.g. "info", "modelkit_db=debug").
    pub log_level: String,

    // ── Model defaults ───────────────────────────────────────────────

    /// The `chrono` format used to store date attributes.
    pub date_format: String,
    /// The default number of models per page.
    pub per_page: usize,
    /// Whether attribute keys are snake cased when a model is converted
    /// to an array.
    pub snake_attributes: bool,
    /// Whether models maintain `created_at`/`updated_at` by default.
    pub timestamps: bool,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Core
            debug: true,

            // Logging
            log_level: "info".to_string(),

            // Model defaults
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            per_page: 15,
            snake_attributes: true,
            timestamps: true,

            // Extra
            extra: HashMap::new(),
        }
    }
}
