//! Mass-assignment protection.
//!
//! A key is fillable when the class is unguarded, or when it is listed in
//! `fillable`. Otherwise it is rejected if it is listed in `guarded` or
//! `guarded` starts with `*`. Anything left is fillable only while
//! `fillable` is empty and the key does not start with `_`.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::class::ModelClass;
use crate::model::Model;
use crate::traits::TraitBundle;
use crate::value::Value;

use super::string_list;

static BUNDLE: Lazy<Arc<TraitBundle>> = Lazy::new(|| {
    TraitBundle::builder("GuardsAttributes")
        .static_method("unguard", |class, args| {
            class.unguard(args.first().and_then(Value::as_bool).unwrap_or(true));
            Ok(Value::Null)
        })
        .static_method("reguard", |class, _| {
            class.reguard();
            Ok(Value::Null)
        })
        .static_method("isUnguarded", |class, _| Ok(Value::Bool(class.is_unguarded())))
        .method("getFillable", |model, _| Ok(string_list(model.fillable())))
        .method("getGuarded", |model, _| Ok(string_list(model.guarded())))
        .method("isFillable", |model, args| {
            Ok(Value::Bool(model.is_fillable(&first_key(args))))
        })
        .method("isGuarded", |model, args| {
            Ok(Value::Bool(model.is_guarded(&first_key(args))))
        })
        .method("totallyGuarded", |model, _| Ok(Value::Bool(model.totally_guarded())))
        .build()
});

/// The `GuardsAttributes` bundle.
pub fn bundle() -> Arc<TraitBundle> {
    Arc::clone(&BUNDLE)
}

fn first_key(args: &[Value]) -> String {
    args.first().map(ToString::to_string).unwrap_or_default()
}

impl ModelClass {
    /// Disables (or, with `false`, re-enables) the mass-assignment guard
    /// for this class.
    ///
    /// The state is read through the parent chain, so subclasses that
    /// never set their own follow this class.
    pub fn unguard(&self, state: bool) {
        self.set_property("unguarded", Value::Bool(state));
    }

    /// Re-enables the mass-assignment guard.
    pub fn reguard(&self) {
        self.unguard(false);
    }

    /// Returns `true` while the guard is disabled on this class or on the
    /// nearest ancestor that set it.
    pub fn is_unguarded(&self) -> bool {
        self.property("unguarded")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Runs `f` with the guard disabled and restores it afterwards, even
    /// if `f` panics. If the class is already unguarded `f` just runs.
    pub fn unguarded<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.is_unguarded() {
            return f();
        }
        self.unguard(true);
        let _reguard = Reguard(self);
        f()
    }
}

struct Reguard<'a>(&'a ModelClass);

impl Drop for Reguard<'_> {
    fn drop(&mut self) {
        self.0.reguard();
    }
}

impl Model {
    /// The mass assignable attributes.
    pub fn fillable(&self) -> &[String] {
        &self.meta.fillable
    }

    /// Replaces the mass assignable attributes.
    pub fn set_fillable<I, S>(&mut self, fillable: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.fillable = fillable.into_iter().map(Into::into).collect();
        self
    }

    /// The guarded attributes.
    pub fn guarded(&self) -> &[String] {
        &self.meta.guarded
    }

    /// Replaces the guarded attributes.
    pub fn guard<I, S>(&mut self, guarded: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.guarded = guarded.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` if `key` may be mass assigned.
    pub fn is_fillable(&self, key: &str) -> bool {
        if self.class().is_unguarded() {
            return true;
        }
        if self.meta.fillable.iter().any(|f| f == key) {
            return true;
        }
        if self.is_guarded(key) {
            return false;
        }
        self.meta.fillable.is_empty() && !key.starts_with('_')
    }

    /// Returns `true` if `key` is guarded.
    pub fn is_guarded(&self, key: &str) -> bool {
        self.guards_everything() || self.meta.guarded.iter().any(|g| g == key)
    }

    /// Returns `true` if nothing may be mass assigned.
    pub fn totally_guarded(&self) -> bool {
        self.meta.fillable.is_empty() && self.guards_everything()
    }

    fn guards_everything(&self) -> bool {
        self.meta.guarded.first().is_some_and(|g| g == "*")
    }

    /// Keeps only the fillable entries of `attributes` when a fillable
    /// list is set and the class is guarded.
    pub fn fillable_from_array(&self, attributes: Vec<(String, Value)>) -> Vec<(String, Value)> {
        if self.meta.fillable.is_empty() || self.class().is_unguarded() {
            return attributes;
        }
        attributes
            .into_iter()
            .filter(|(key, _)| self.meta.fillable.contains(key))
            .collect()
    }
}
