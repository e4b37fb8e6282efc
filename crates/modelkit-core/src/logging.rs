//! Logging integration for modelkit.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-class spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug",
/// "modelkit_db=trace"). In debug mode a pretty, human-readable format is
/// used; otherwise a structured JSON format is used. Installing a second
/// subscriber is silently ignored.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for work done on behalf of a model class.
///
/// # Examples
///
/// ```
/// use modelkit_core::logging::class_span;
///
/// let span = class_span("User");
/// let _guard = span.enter();
/// tracing::debug!("booting");
/// ```
pub fn class_span(class: &str) -> tracing::Span {
    tracing::debug_span!("model", class = class)
}
