//! The model registry.
//!
//! A [`ModelRegistry`] is the explicit owner of everything the model layer
//! keeps between calls: the [`TraitRegistry`], the [`LifecycleBooter`], the
//! event dispatcher, global scopes and the list of classes whose touches
//! are suppressed. Classes are defined through a registry and keep a handle
//! to it; nothing is stored in process globals, so separate registries
//! (for example one per test) never see each other's state.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use modelkit_core::Settings;
use modelkit_signals::Dispatcher;

use crate::boot::LifecycleBooter;
use crate::class::{ClassBuilder, ClassId, ModelClass};
use crate::concerns::{guards_attributes, has_attributes, has_events};
use crate::traits::{TraitBundle, TraitRegistry};
use crate::value::Value;

/// A global query scope.
///
/// Scopes are stored per class and handed to the query layer, which
/// supplies its own builder type behind `dyn Any`.
pub trait Scope: Send + Sync {
    /// Applies the scope to `query` for models of `class`.
    fn apply(&self, query: &mut dyn Any, class: &ModelClass);
}

impl<F> Scope for F
where
    F: Fn(&mut dyn Any, &ModelClass) + Send + Sync,
{
    fn apply(&self, query: &mut dyn Any, class: &ModelClass) {
        self(query, class);
    }
}

/// Owns the trait registry, the booter and the model event dispatcher.
///
/// # Examples
///
/// ```
/// use modelkit_db::{Model, ModelClass, ModelRegistry, Value};
///
/// let registry = ModelRegistry::new();
/// let user = registry.define(ModelClass::builder("User").fillable(["name"]));
///
/// let model = Model::with_attributes(&user, [("name", "Taylor")]).unwrap();
/// assert_eq!(model.get_attribute("name").unwrap(), Value::from("Taylor"));
/// assert!(registry.booter().is_booted(user.id()));
/// ```
pub struct ModelRegistry {
    settings: Settings,
    traits: TraitRegistry,
    booter: LifecycleBooter,
    dispatcher: RwLock<Option<Arc<dyn Dispatcher>>>,
    global_scopes: RwLock<HashMap<ClassId, Vec<(String, Arc<dyn Scope>)>>>,
    ignore_on_touch: Mutex<Vec<ClassId>>,
}

impl ModelRegistry {
    /// Creates a registry with default settings.
    pub fn new() -> Arc<Self> {
        Self::with_settings(Settings::default())
    }

    /// Creates a registry whose classes take their per-page size, date
    /// format, timestamps and snake-case flag from `settings`.
    pub fn with_settings(settings: Settings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            traits: TraitRegistry::new(),
            booter: LifecycleBooter::new(),
            dispatcher: RwLock::new(None),
            global_scopes: RwLock::new(HashMap::new()),
            ignore_on_touch: Mutex::new(Vec::new()),
        })
    }

    /// The registry settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The trait registry.
    pub const fn traits(&self) -> &TraitRegistry {
        &self.traits
    }

    /// The lifecycle booter.
    pub const fn booter(&self) -> &LifecycleBooter {
        &self.booter
    }

    /// Defines a model class.
    ///
    /// The `HasEvents`, `GuardsAttributes` and `HasAttributes` concerns are
    /// applied first, then the builder's own bundles in the order they were
    /// added.
    pub fn define(self: &Arc<Self>, builder: ClassBuilder) -> Arc<ModelClass> {
        let defaults = [
            has_events::bundle(),
            guards_attributes::bundle(),
            has_attributes::bundle(),
        ];
        let class = self.build(builder, &defaults);
        class.set_property(
            "snakeAttributes",
            Value::Bool(self.settings.snake_attributes),
        );
        class
    }

    /// Defines a model class with only the builder's own bundles.
    pub fn declare(self: &Arc<Self>, builder: ClassBuilder) -> Arc<ModelClass> {
        self.build(builder, &[])
    }

    fn build(
        self: &Arc<Self>,
        mut builder: ClassBuilder,
        defaults: &[Arc<TraitBundle>],
    ) -> Arc<ModelClass> {
        builder.apply_settings(&self.settings);
        let (class, bundles) = builder.build(Arc::clone(self));
        for bundle in defaults.iter().chain(&bundles) {
            self.traits.apply(bundle, &class);
        }
        tracing::debug!(class = class.name(), id = ?class.id(), "model class defined");
        class
    }

    /// Applies `bundle` to an already defined class.
    pub fn apply_trait(&self, class: &ModelClass, bundle: &Arc<TraitBundle>) -> bool {
        self.traits.apply(bundle, class)
    }

    /// The bundles applied directly to `class`, in application order.
    pub fn applied_traits(&self, class: &ModelClass) -> Vec<Arc<TraitBundle>> {
        self.traits.applied_traits(class)
    }

    /// Forgets which classes were booted and drops every global scope.
    ///
    /// The next construction of any class boots it again.
    pub fn clear_booted_models(&self) {
        self.booter.clear();
        self.global_scopes
            .write()
            .expect("global scope lock poisoned")
            .clear();
        tracing::debug!("booted models cleared");
    }

    // ── Event dispatcher ─────────────────────────────────────────────

    /// The current event dispatcher, if any.
    pub fn event_dispatcher(&self) -> Option<Arc<dyn Dispatcher>> {
        self.dispatcher
            .read()
            .expect("dispatcher slot lock poisoned")
            .clone()
    }

    /// Installs the event dispatcher used by every class of this registry.
    pub fn set_event_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        *self.dispatcher.write().expect("dispatcher slot lock poisoned") = Some(dispatcher);
    }

    /// Removes the event dispatcher. Model events are dropped until a new
    /// one is installed.
    pub fn unset_event_dispatcher(&self) {
        *self.dispatcher.write().expect("dispatcher slot lock poisoned") = None;
    }

    // ── Global scopes ────────────────────────────────────────────────

    /// Registers a global scope called `name` on `class`, replacing any
    /// scope of the same name.
    pub fn add_global_scope(
        &self,
        class: &ModelClass,
        name: impl Into<String>,
        scope: Arc<dyn Scope>,
    ) {
        let name = name.into();
        let mut scopes = self.global_scopes.write().expect("global scope lock poisoned");
        let entries = scopes.entry(class.id()).or_default();
        entries.retain(|(n, _)| *n != name);
        entries.push((name, scope));
    }

    /// Returns `true` if `class` has a global scope called `name`.
    pub fn has_global_scope(&self, class: &ModelClass, name: &str) -> bool {
        self.global_scope(class, name).is_some()
    }

    /// Returns the global scope called `name` registered on `class`.
    pub fn global_scope(&self, class: &ModelClass, name: &str) -> Option<Arc<dyn Scope>> {
        self.global_scopes
            .read()
            .expect("global scope lock poisoned")
            .get(&class.id())?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, scope)| Arc::clone(scope))
    }

    /// Every global scope registered on `class`, in registration order.
    pub fn global_scopes(&self, class: &ModelClass) -> Vec<(String, Arc<dyn Scope>)> {
        self.global_scopes
            .read()
            .expect("global scope lock poisoned")
            .get(&class.id())
            .cloned()
            .unwrap_or_default()
    }

    // ── Touch suppression ────────────────────────────────────────────

    /// Runs `f` with touches of `class` (and its subclasses) suppressed.
    pub fn without_touching<R>(&self, class: &ModelClass, f: impl FnOnce() -> R) -> R {
        self.without_touching_on(&[class], f)
    }

    /// Runs `f` with touches of every class in `classes` suppressed.
    ///
    /// The previous suppression list is restored when `f` returns or
    /// unwinds.
    pub fn without_touching_on<R>(&self, classes: &[&ModelClass], f: impl FnOnce() -> R) -> R {
        let previous = {
            let mut ignored = self.ignore_on_touch.lock().expect("touch lock poisoned");
            let previous = ignored.clone();
            ignored.extend(classes.iter().map(|c| c.id()));
            previous
        };
        let _restore = RestoreTouch {
            registry: self,
            previous: Some(previous),
        };
        f()
    }

    /// Returns `true` if touching `class` is currently suppressed.
    ///
    /// Classes without timestamps are never touched.
    pub fn is_ignoring_touch(&self, class: &ModelClass) -> bool {
        if !class.meta().timestamps {
            return true;
        }
        self.ignore_on_touch
            .lock()
            .expect("touch lock poisoned")
            .iter()
            .any(|ignored| class.is_subclass_of(*ignored))
    }
}

struct RestoreTouch<'a> {
    registry: &'a ModelRegistry,
    previous: Option<Vec<ClassId>>,
}

impl Drop for RestoreTouch<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Ok(mut ignored) = self.registry.ignore_on_touch.lock() {
                *ignored = previous;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelkit_signals::EventDispatcher;

    #[test]
    fn test_define_applies_default_concerns_first() {
        let registry = ModelRegistry::new();
        let extra = TraitBundle::builder("Sluggable").build();
        let class = registry.define(ModelClass::builder("Post").with_trait(&extra));

        let names: Vec<String> = registry
            .applied_traits(&class)
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["HasEvents", "GuardsAttributes", "HasAttributes", "Sluggable"]
        );
    }

    #[test]
    fn test_declare_applies_only_own_bundles() {
        let registry = ModelRegistry::new();
        let class = registry.declare(ModelClass::builder("Plain"));
        assert!(registry.applied_traits(&class).is_empty());
        assert!(!class.has_static_member("unguard"));
    }

    #[test]
    fn test_settings_flow_into_class_meta() {
        let registry = ModelRegistry::with_settings(Settings {
            per_page: 50,
            date_format: "%d/%m/%Y".to_string(),
            snake_attributes: false,
            ..Settings::default()
        });
        let class = registry.define(ModelClass::builder("Post"));
        assert_eq!(class.meta().per_page, 50);
        assert_eq!(class.meta().date_format.as_deref(), Some("%d/%m/%Y"));
        assert_eq!(class.property("snakeAttributes"), Some(Value::Bool(false)));

        let explicit = registry.define(ModelClass::builder("Comment").per_page(5));
        assert_eq!(explicit.meta().per_page, 5);
    }

    #[test]
    fn test_dispatcher_set_and_unset() {
        let registry = ModelRegistry::new();
        assert!(registry.event_dispatcher().is_none());

        registry.set_event_dispatcher(Arc::new(EventDispatcher::new()));
        assert!(registry.event_dispatcher().is_some());

        registry.unset_event_dispatcher();
        assert!(registry.event_dispatcher().is_none());
    }

    #[test]
    fn test_global_scopes_are_replaced_by_name_and_cleared() {
        let registry = ModelRegistry::new();
        let class = registry.define(ModelClass::builder("Post"));

        registry.add_global_scope(&class, "active", Arc::new(|_: &mut dyn Any, _: &ModelClass| {}));
        registry.add_global_scope(&class, "active", Arc::new(|_: &mut dyn Any, _: &ModelClass| {}));
        registry.add_global_scope(&class, "recent", Arc::new(|_: &mut dyn Any, _: &ModelClass| {}));

        assert!(registry.has_global_scope(&class, "active"));
        assert_eq!(registry.global_scopes(&class).len(), 2);

        registry.clear_booted_models();
        assert!(!registry.has_global_scope(&class, "active"));
        assert!(registry.global_scopes(&class).is_empty());
    }

    #[test]
    fn test_scope_receives_query() {
        let registry = ModelRegistry::new();
        let class = registry.define(ModelClass::builder("Post"));
        registry.add_global_scope(
            &class,
            "published",
            Arc::new(|query: &mut dyn Any, class: &ModelClass| {
                if let Some(wheres) = query.downcast_mut::<Vec<String>>() {
                    wheres.push(format!("{}.published = 1", class.name()));
                }
            }),
        );

        let mut wheres: Vec<String> = Vec::new();
        for (_, scope) in registry.global_scopes(&class) {
            scope.apply(&mut wheres, &class);
        }
        assert_eq!(wheres, vec!["Post.published = 1"]);
    }

    #[test]
    fn test_without_touching_restores_previous_list() {
        let registry = ModelRegistry::new();
        let user = registry.define(ModelClass::builder("User"));
        let post = registry.define(ModelClass::builder("Post"));

        registry.without_touching(&user, || {
            assert!(registry.is_ignoring_touch(&user));
            assert!(!registry.is_ignoring_touch(&post));

            registry.without_touching(&post, || {
                assert!(registry.is_ignoring_touch(&user));
                assert!(registry.is_ignoring_touch(&post));
            });

            assert!(registry.is_ignoring_touch(&user));
            assert!(!registry.is_ignoring_touch(&post));
        });

        assert!(!registry.is_ignoring_touch(&user));
    }

    #[test]
    fn test_without_touching_restores_after_error() {
        let registry = ModelRegistry::new();
        let user = registry.define(ModelClass::builder("User"));

        let result: Result<(), &str> = registry.without_touching(&user, || Err("failed"));
        assert!(result.is_err());
        assert!(!registry.is_ignoring_touch(&user));
    }

    #[test]
    fn test_ignoring_touch_covers_subclasses_and_untimestamped() {
        let registry = ModelRegistry::new();
        let base = registry.define(ModelClass::builder("Base"));
        let child = registry.define(ModelClass::builder("Child").extends(&base));
        let plain = registry.define(ModelClass::builder("Log").timestamps(false));

        assert!(registry.is_ignoring_touch(&plain));
        registry.without_touching(&base, || {
            assert!(registry.is_ignoring_touch(&child));
        });
        assert!(!registry.is_ignoring_touch(&child));
    }
}
