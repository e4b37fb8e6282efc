//! Trait bundles and the trait registry.
//!
//! A [`TraitBundle`] is a named, immutable set of class-level and
//! instance-level members composed onto model classes. A bundle may declare
//! a one-time boot hook and a per-instance initializer; they are stored as
//! ordinary members under the names `boot{Name}` and `initialize{Name}`, so
//! a bundle named `Sluggable` contributes `bootSluggable` and
//! `initializeSluggable`.
//!
//! The [`TraitRegistry`] records which bundles were applied to which class
//! and copies each bundle's members onto the class exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use modelkit_core::ModelResult;

use crate::class::{ClassId, InstanceMember, ModelClass, StaticMember};
use crate::model::Model;
use crate::value::Value;

/// A named collection of members composed onto model classes.
///
/// # Examples
///
/// ```
/// use modelkit_db::{TraitBundle, Value};
///
/// let sluggable = TraitBundle::builder("Sluggable")
///     .property("slugSeparator", Value::from("-"))
///     .boot(|_class| Ok(()))
///     .initialize(|model| {
///         model.set_raw_attribute("slug", Value::Null);
///         Ok(())
///     })
///     .build();
///
/// assert_eq!(sluggable.boot_hook_name(), "bootSluggable");
/// assert_eq!(sluggable.initializer_name(), "initializeSluggable");
/// ```
pub struct TraitBundle {
    name: String,
    static_members: Vec<(String, StaticMember)>,
    instance_members: Vec<(String, InstanceMember)>,
}

impl fmt::Debug for TraitBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraitBundle")
            .field("name", &self.name)
            .field(
                "static_members",
                &self.static_members.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field(
                "instance_members",
                &self.instance_members.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TraitBundle {
    /// Starts building a bundle called `name`.
    pub fn builder(name: impl Into<String>) -> TraitBundleBuilder {
        TraitBundleBuilder {
            name: name.into(),
            static_members: Vec::new(),
            instance_members: Vec::new(),
        }
    }

    /// The declared name of the bundle.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the bundle's one-time boot hook.
    pub fn boot_hook_name(&self) -> String {
        format!("boot{}", self.name)
    }

    /// The name of the bundle's per-instance initializer.
    pub fn initializer_name(&self) -> String {
        format!("initialize{}", self.name)
    }

    /// Class-level members, in declaration order.
    pub fn static_members(&self) -> impl Iterator<Item = (&str, &StaticMember)> {
        self.static_members.iter().map(|(n, m)| (n.as_str(), m))
    }

    /// Instance-level members, in declaration order.
    pub fn instance_members(&self) -> impl Iterator<Item = (&str, &InstanceMember)> {
        self.instance_members.iter().map(|(n, m)| (n.as_str(), m))
    }

    /// Returns `true` if the bundle declares no members at all.
    pub fn is_empty(&self) -> bool {
        self.static_members.is_empty() && self.instance_members.is_empty()
    }
}

/// Builds a [`TraitBundle`].
///
/// Declaring the same member name twice keeps the last declaration.
pub struct TraitBundleBuilder {
    name: String,
    static_members: Vec<(String, StaticMember)>,
    instance_members: Vec<(String, InstanceMember)>,
}

impl TraitBundleBuilder {
    fn push_static(mut self, name: String, member: StaticMember) -> Self {
        self.static_members.retain(|(n, _)| *n != name);
        self.static_members.push((name, member));
        self
    }

    fn push_instance(mut self, name: String, member: InstanceMember) -> Self {
        self.instance_members.retain(|(n, _)| *n != name);
        self.instance_members.push((name, member));
        self
    }

    /// Declares a class property.
    #[must_use]
    pub fn property(self, name: impl Into<String>, value: Value) -> Self {
        self.push_static(name.into(), StaticMember::Property(value))
    }

    /// Declares a class-level method.
    #[must_use]
    pub fn static_method<F>(self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Arc<ModelClass>, &[Value]) -> ModelResult<Value> + Send + Sync + 'static,
    {
        self.push_static(name.into(), StaticMember::Method(Arc::new(method)))
    }

    /// Declares an instance-level method.
    #[must_use]
    pub fn method<F>(self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&mut Model, &[Value]) -> ModelResult<Value> + Send + Sync + 'static,
    {
        self.push_instance(name.into(), InstanceMember::Method(Arc::new(method)))
    }

    /// Declares the bundle's one-time boot hook, stored as `boot{Name}`.
    #[must_use]
    pub fn boot<F>(self, hook: F) -> Self
    where
        F: Fn(&Arc<ModelClass>) -> ModelResult<()> + Send + Sync + 'static,
    {
        let name = format!("boot{}", self.name);
        self.push_static(name, StaticMember::Boot(Arc::new(hook)))
    }

    /// Declares the bundle's per-instance initializer, stored as
    /// `initialize{Name}`.
    #[must_use]
    pub fn initialize<F>(self, hook: F) -> Self
    where
        F: Fn(&mut Model) -> ModelResult<()> + Send + Sync + 'static,
    {
        let name = format!("initialize{}", self.name);
        self.push_instance(name, InstanceMember::Initializer(Arc::new(hook)))
    }

    /// Freezes the bundle.
    pub fn build(self) -> Arc<TraitBundle> {
        Arc::new(TraitBundle {
            name: self.name,
            static_members: self.static_members,
            instance_members: self.instance_members,
        })
    }
}

/// Records which bundles were applied to which class.
///
/// Trait-sets are per class: applying a bundle to a class says nothing
/// about its subclasses or its parent.
#[derive(Default)]
pub struct TraitRegistry {
    applied: RwLock<HashMap<ClassId, Vec<Arc<TraitBundle>>>>,
}

impl TraitRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `bundle`'s members onto `class` and records the pair.
    ///
    /// Applying the same bundle (by identity) to the same class again does
    /// nothing and returns `false`. Members colliding with those of an
    /// earlier bundle overwrite them.
    pub fn apply(&self, bundle: &Arc<TraitBundle>, class: &ModelClass) -> bool {
        let mut applied = self.applied.write().expect("trait registry lock poisoned");
        let set = applied.entry(class.id()).or_default();
        if set.iter().any(|b| Arc::ptr_eq(b, bundle)) {
            tracing::trace!(class = class.name(), bundle = bundle.name(), "bundle already applied");
            return false;
        }

        for (name, member) in &bundle.static_members {
            class.insert_static_member(name.clone(), member.clone());
        }
        for (name, member) in &bundle.instance_members {
            class.insert_instance_member(name.clone(), member.clone());
        }
        set.push(Arc::clone(bundle));
        drop(applied);

        tracing::debug!(class = class.name(), bundle = bundle.name(), "bundle applied");
        true
    }

    /// The bundles applied directly to `class`, in application order.
    pub fn applied_traits(&self, class: &ModelClass) -> Vec<Arc<TraitBundle>> {
        self.applied
            .read()
            .expect("trait registry lock poisoned")
            .get(&class.id())
            .cloned()
            .unwrap_or_default()
    }

    /// Returns `true` if a bundle called `name` was applied to `class`.
    pub fn uses_trait(&self, class: &ModelClass, name: &str) -> bool {
        self.applied
            .read()
            .expect("trait registry lock poisoned")
            .get(&class.id())
            .is_some_and(|set| set.iter().any(|b| b.name() == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelRegistry;

    fn bare_class(name: &str) -> Arc<ModelClass> {
        ModelRegistry::new().declare(ModelClass::builder(name))
    }

    #[test]
    fn test_hook_names_derive_from_bundle_name() {
        let bundle = TraitBundle::builder("SoftDeletes").build();
        assert_eq!(bundle.boot_hook_name(), "bootSoftDeletes");
        assert_eq!(bundle.initializer_name(), "initializeSoftDeletes");
        assert!(bundle.is_empty());
    }

    #[test]
    fn test_boot_and_initialize_register_named_members() {
        let bundle = TraitBundle::builder("Sluggable")
            .boot(|_| Ok(()))
            .initialize(|_| Ok(()))
            .build();

        let statics: Vec<&str> = bundle.static_members().map(|(n, _)| n).collect();
        let instance: Vec<&str> = bundle.instance_members().map(|(n, _)| n).collect();
        assert_eq!(statics, vec!["bootSluggable"]);
        assert_eq!(instance, vec!["initializeSluggable"]);
    }

    #[test]
    fn test_redeclared_member_keeps_last() {
        let bundle = TraitBundle::builder("Flags")
            .property("flag", Value::Bool(false))
            .property("other", Value::Int(1))
            .property("flag", Value::Bool(true))
            .build();

        let statics: Vec<(&str, Option<bool>)> = bundle
            .static_members()
            .map(|(n, m)| match m {
                StaticMember::Property(v) => (n, v.as_bool()),
                _ => (n, None),
            })
            .collect();
        assert_eq!(statics, vec![("other", None), ("flag", Some(true))]);
    }

    #[test]
    fn test_apply_copies_members() {
        let class = bare_class("Post");
        let traits = TraitRegistry::new();
        let bundle = TraitBundle::builder("Publishes")
            .property("published", Value::Bool(false))
            .method("publish", |_, _| Ok(Value::Bool(true)))
            .build();

        assert!(traits.apply(&bundle, &class));
        assert_eq!(class.property("published"), Some(Value::Bool(false)));
        assert!(class.has_instance_member("publish"));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let class = bare_class("Post");
        let traits = TraitRegistry::new();
        let bundle = TraitBundle::builder("Publishes")
            .property("published", Value::Bool(false))
            .build();

        assert!(traits.apply(&bundle, &class));
        class.set_property("published", Value::Bool(true));
        assert!(!traits.apply(&bundle, &class));

        assert_eq!(traits.applied_traits(&class).len(), 1);
        // the second apply did not copy the property again
        assert_eq!(class.property("published"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_same_name_different_bundle_is_applied() {
        let class = bare_class("Post");
        let traits = TraitRegistry::new();
        let first = TraitBundle::builder("Tagged").build();
        let second = TraitBundle::builder("Tagged").build();

        assert!(traits.apply(&first, &class));
        assert!(traits.apply(&second, &class));
        assert_eq!(traits.applied_traits(&class).len(), 2);
    }

    #[test]
    fn test_last_applied_wins_on_collision() {
        let class = bare_class("Post");
        let traits = TraitRegistry::new();
        let a = TraitBundle::builder("A")
            .property("label", Value::from("a"))
            .build();
        let b = TraitBundle::builder("B")
            .property("label", Value::from("b"))
            .build();

        traits.apply(&a, &class);
        traits.apply(&b, &class);
        assert_eq!(class.property("label"), Some(Value::from("b")));
    }

    #[test]
    fn test_empty_bundle_is_recorded() {
        let class = bare_class("Post");
        let traits = TraitRegistry::new();
        let empty = TraitBundle::builder("Marker").build();

        assert!(traits.apply(&empty, &class));
        assert!(traits.uses_trait(&class, "Marker"));
        assert!(!traits.uses_trait(&class, "Other"));
    }

    #[test]
    fn test_applied_traits_keeps_order_and_is_per_class() {
        let registry = ModelRegistry::new();
        let x = registry.declare(ModelClass::builder("X"));
        let y = registry.declare(ModelClass::builder("Y"));
        let traits = TraitRegistry::new();
        let a = TraitBundle::builder("A").build();
        let b = TraitBundle::builder("B").build();

        traits.apply(&b, &x);
        traits.apply(&a, &x);

        let names: Vec<String> = traits
            .applied_traits(&x)
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["B", "A"]);
        assert!(traits.applied_traits(&y).is_empty());
    }

    #[test]
    fn test_subclass_does_not_inherit_trait_set() {
        let registry = ModelRegistry::new();
        let parent = registry.declare(ModelClass::builder("Parent"));
        let child = registry.declare(ModelClass::builder("Child").extends(&parent));
        let traits = TraitRegistry::new();
        let bundle = TraitBundle::builder("Greets")
            .static_method("greet", |_, _| Ok(Value::from("hi")))
            .build();

        traits.apply(&bundle, &parent);
        assert!(traits.applied_traits(&child).is_empty());
        // members are still reachable through the parent chain
        assert!(child.has_static_member("greet"));
    }
}
