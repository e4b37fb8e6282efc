//! # modelkit-db
//!
//! The model layer of modelkit. Provides [`ModelClass`] descriptors composed
//! from [`TraitBundle`]s, the [`LifecycleBooter`] that boots each class once
//! and initializes every instance, and the [`Model`] instance type with its
//! mass-assignment guard, attribute casting, dirty tracking and events.
//!
//! ## Architecture
//!
//! A [`ModelRegistry`] is created explicitly and owns all state: which
//! bundles were applied to which class, which classes are booted, the event
//! dispatcher and global scopes. Defining a class applies its bundles,
//! copying their members onto the class. The first [`Model::new`] of a class
//! runs each bundle's `boot{Name}` hook; every `Model::new` runs the
//! recorded `initialize{Name}` hooks before attributes are filled.
//!
//! ## Module Overview
//!
//! - [`value`] - The [`Value`] enum attributes are made of
//! - [`class`] - [`ModelClass`], its builder and member types
//! - [`traits`] - [`TraitBundle`] and the [`TraitRegistry`]
//! - [`boot`] - The [`LifecycleBooter`]
//! - [`registry`] - The [`ModelRegistry`] and global [`Scope`]s
//! - [`model`] - The [`Model`] instance
//! - [`concerns`] - Guarding, attributes and events

// These clippy lints are intentionally allowed for the model crate:
// - doc_markdown: member names like isFillable are not code items
// - return_self_not_must_use: builder and fluent setter methods are self-documenting
// - missing_const_for_fn: several accessors may grow non-const bodies
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]
// significant_drop_tightening: lock guards are dropped explicitly before hooks run
#![allow(clippy::significant_drop_tightening)]

pub mod boot;
pub mod class;
pub mod concerns;
pub mod model;
pub mod registry;
pub mod traits;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use boot::LifecycleBooter;
pub use class::{
    BootHook, ClassBuilder, ClassId, GetMutator, InitializerHook, InstanceMember, InstanceMethod,
    ModelClass, ModelMeta, SetMutator, StaticMember, StaticMethod, CREATED_AT, UPDATED_AT,
};
pub use concerns::has_attributes::Cast;
pub use concerns::has_events::{CustomEvent, ModelObserver, OBSERVABLE_EVENTS};
pub use model::Model;
pub use registry::{ModelRegistry, Scope};
pub use traits::{TraitBundle, TraitBundleBuilder, TraitRegistry};
pub use value::Value;
