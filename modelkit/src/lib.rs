//! # modelkit
//!
//! An ActiveRecord-style model layer for Rust.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `modelkit` to get everything, or on the individual
//! crates for finer-grained control.
//!
//! ```rust,ignore
//! use modelkit::prelude::*;
//!
//! let registry = ModelRegistry::new();
//! let user = registry.define(ModelClass::builder("User").fillable(["name"]));
//! let model = Model::with_attributes(&user, [("name", "Ada")])?;
//! ```

/// Settings, error types, logging and string helpers.
pub use modelkit_core as core;

/// Model classes, trait bundles, the boot lifecycle and model instances.
#[cfg(feature = "db")]
pub use modelkit_db as db;

/// Event dispatcher used for model events.
#[cfg(feature = "signals")]
pub use modelkit_signals as signals;

/// The types most applications need, in one import.
pub mod prelude {
    pub use modelkit_core::{ModelError, ModelResult, Settings};

    #[cfg(feature = "db")]
    pub use modelkit_db::{
        Cast, ClassBuilder, CustomEvent, Model, ModelClass, ModelObserver, ModelRegistry, Scope,
        TraitBundle, Value,
    };

    #[cfg(feature = "signals")]
    pub use modelkit_signals::{Dispatcher, EventDispatcher};
}
