//! Core error types for modelkit.
//!
//! [`ModelError`] covers every failure the model layer can surface: rejected
//! mass assignment, calls to members a class does not have, attribute casts
//! that cannot be performed, failures raised by user hooks, and the
//! configuration/serialization/IO errors of the ambient stack.

use thiserror::Error;

/// The primary error type for modelkit.
///
/// Errors returned by user-supplied hooks (boot hooks, initializers, boot
/// callbacks) are propagated to the caller of `Model::new` exactly as the
/// hook returned them; the model layer never wraps or translates them.
#[derive(Error, Debug)]
pub enum ModelError {
    // ── Model layer ──────────────────────────────────────────────────

    /// A totally guarded model was asked to mass assign an attribute.
    #[error("Add [{key}] to fillable property to allow mass assignment on [{class}].")]
    MassAssignment {
        /// The rejected attribute key.
        key: String,
        /// The name of the model class.
        class: String,
    },

    /// A member (class-level or instance-level) was called but is not
    /// defined on the class.
    #[error("Call to undefined member {class}::{member}")]
    UndefinedMember {
        /// The name of the model class.
        class: String,
        /// The missing member name.
        member: String,
    },

    /// A value could not be cast to the declared attribute type.
    #[error("Cannot cast attribute [{key}] to [{cast}]: {message}")]
    InvalidCast {
        /// The attribute key.
        key: String,
        /// The declared cast type.
        cast: String,
        /// Why the cast failed.
        message: String,
    },

    /// A user hook, initializer, listener or boot callback failed.
    #[error("Hook failed: {0}")]
    Hook(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during JSON encoding or decoding.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ModelError {
    /// Shorthand for [`ModelError::Hook`].
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// Returns `true` if this error was raised by the mass-assignment guard.
    pub const fn is_mass_assignment(&self) -> bool {
        matches!(self, Self::MassAssignment { .. })
    }
}

/// A convenience type alias for `Result<T, ModelError>`.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_assignment_display() {
        let err = ModelError::MassAssignment {
            key: "is_admin".into(),
            class: "User".into(),
        };
        assert_eq!(
            err.to_string(),
            "Add [is_admin] to fillable property to allow mass assignment on [User]."
        );
        assert!(err.is_mass_assignment());
    }

    #[test]
    fn test_undefined_member_display() {
        let err = ModelError::UndefinedMember {
            class: "Post".into(),
            member: "publish".into(),
        };
        assert_eq!(err.to_string(), "Call to undefined member Post::publish");
        assert!(!err.is_mass_assignment());
    }

    #[test]
    fn test_hook_shorthand() {
        let err = ModelError::hook("boom");
        assert!(matches!(err, ModelError::Hook(ref m) if m == "boom"));
        assert_eq!(err.to_string(), "Hook failed: boom");
    }

    #[test]
    fn test_invalid_cast_display() {
        let err = ModelError::InvalidCast {
            key: "age".into(),
            cast: "int".into(),
            message: "not a number".into(),
        };
        assert!(err.to_string().contains("[age]"));
        assert!(err.to_string().contains("[int]"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ModelError = json_err.into();
        assert!(err.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: ModelError = io_err.into();
        assert!(err.to_string().contains("file missing"));
    }
}
