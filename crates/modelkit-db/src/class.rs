//! Model classes.
//!
//! A [`ModelClass`] is the runtime descriptor of one concrete model type:
//! its name and identity, its parent class, the class-level and
//! instance-level member tables trait bundles are copied onto, the
//! per-instance defaults every new [`Model`] starts from, and its attribute
//! mutators.
//!
//! Classes are built with a [`ClassBuilder`] and registered through
//! [`ModelRegistry::define`](crate::registry::ModelRegistry::define).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use modelkit_core::utils::text::{snake_case, studly_case};
use modelkit_core::{ModelError, ModelResult, Settings};

use crate::concerns::has_events::CustomEvent;
use crate::model::Model;
use crate::registry::ModelRegistry;
use crate::traits::TraitBundle;
use crate::value::Value;

/// The name of the "created at" column.
pub const CREATED_AT: &str = "created_at";

/// The name of the "updated at" column.
pub const UPDATED_AT: &str = "updated_at";

/// A class-level method: receives the class and positional arguments.
pub type StaticMethod =
    Arc<dyn Fn(&Arc<ModelClass>, &[Value]) -> ModelResult<Value> + Send + Sync>;

/// An instance-level method: receives the model and positional arguments.
pub type InstanceMethod = Arc<dyn Fn(&mut Model, &[Value]) -> ModelResult<Value> + Send + Sync>;

/// A one-time class boot hook (`boot{Trait}`).
pub type BootHook = Arc<dyn Fn(&Arc<ModelClass>) -> ModelResult<()> + Send + Sync>;

/// A per-instance initializer (`initialize{Trait}`).
pub type InitializerHook = Arc<dyn Fn(&mut Model) -> ModelResult<()> + Send + Sync>;

/// Transforms a stored attribute value on read.
pub type GetMutator = Arc<dyn Fn(&Model, Value) -> Value + Send + Sync>;

/// Stores an attribute value on write; the mutator writes the raw
/// attributes itself.
pub type SetMutator = Arc<dyn Fn(&mut Model, Value) -> ModelResult<()> + Send + Sync>;

/// A member of a class's class-level namespace.
#[derive(Clone)]
pub enum StaticMember {
    /// A class property such as `unguarded`.
    Property(Value),
    /// A class method such as `unguard`.
    Method(StaticMethod),
    /// A one-time boot hook.
    Boot(BootHook),
}

/// A member of a class's instance-level namespace.
#[derive(Clone)]
pub enum InstanceMember {
    /// An instance method such as `isFillable`.
    Method(InstanceMethod),
    /// A per-instance initializer.
    Initializer(InitializerHook),
}

impl fmt::Debug for StaticMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(v) => f.debug_tuple("Property").field(v).finish(),
            Self::Method(_) => f.write_str("Method(..)"),
            Self::Boot(_) => f.write_str("Boot(..)"),
        }
    }
}

impl fmt::Debug for InstanceMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(_) => f.write_str("Method(..)"),
            Self::Initializer(_) => f.write_str("Initializer(..)"),
        }
    }
}

/// Process-unique identity of a [`ModelClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl ClassId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Class options copied onto every new model of the class.
#[derive(Clone)]
pub struct ModelMeta {
    /// The table associated with the model.
    pub table: Option<String>,
    /// The connection name for the model.
    pub connection: Option<String>,
    /// The primary key column.
    pub primary_key: String,
    /// The "type" of the primary key.
    pub key_type: String,
    /// Whether the primary key auto-increments.
    pub incrementing: bool,
    /// Number of models per page.
    pub per_page: usize,
    /// Whether `created_at`/`updated_at` are maintained.
    pub timestamps: bool,
    /// Mass assignable attributes.
    pub fillable: Vec<String>,
    /// Attributes that aren't mass assignable.
    pub guarded: Vec<String>,
    /// Attribute casts, keyed by attribute.
    pub casts: HashMap<String, String>,
    /// Attributes treated as dates.
    pub dates: Vec<String>,
    /// Storage format of date columns (`chrono` syntax).
    pub date_format: Option<String>,
    /// Accessors appended to the array form.
    pub appends: Vec<String>,
    /// User-defined observable events.
    pub observables: Vec<String>,
    /// Custom event objects fired in place of native events.
    pub dispatches_events: HashMap<String, CustomEvent>,
    /// Relations to eager load on every query.
    pub with: Vec<String>,
    /// Relation counts to eager load on every query.
    pub with_count: Vec<String>,
}

impl Default for ModelMeta {
    fn default() -> Self {
        Self {
            table: None,
            connection: None,
            primary_key: "id".to_string(),
            key_type: "int".to_string(),
            incrementing: true,
            per_page: 15,
            timestamps: true,
            fillable: Vec::new(),
            guarded: vec!["*".to_string()],
            casts: HashMap::new(),
            dates: Vec::new(),
            date_format: None,
            appends: Vec::new(),
            observables: Vec::new(),
            dispatches_events: HashMap::new(),
            with: Vec::new(),
            with_count: Vec::new(),
        }
    }
}

/// The runtime descriptor of a model class.
///
/// Member lookups (`static_member`, `instance_member`, `property`) walk the
/// parent chain, the way static and prototype members are inherited. Trait
/// bookkeeping is not inherited: see
/// [`TraitRegistry`](crate::traits::TraitRegistry).
pub struct ModelClass {
    id: ClassId,
    name: String,
    event_scope: String,
    parent: Option<Arc<ModelClass>>,
    registry: Arc<ModelRegistry>,
    static_members: RwLock<HashMap<String, StaticMember>>,
    instance_members: RwLock<HashMap<String, InstanceMember>>,
    meta: ModelMeta,
    get_mutators: HashMap<String, GetMutator>,
    set_mutators: HashMap<String, SetMutator>,
    boot_callbacks: Vec<BootHook>,
    mutator_cache: OnceLock<Vec<String>>,
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .finish_non_exhaustive()
    }
}

impl ModelClass {
    /// Starts building a class called `name`.
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name)
    }

    /// Returns the class identity.
    pub const fn id(&self) -> ClassId {
        self.id
    }

    /// Returns the class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The class qualifier model event listeners are keyed by.
    ///
    /// Combines the name with the class id (`User#3`), so two classes
    /// sharing a name never share listeners.
    pub fn event_scope(&self) -> &str {
        &self.event_scope
    }

    /// Returns the parent class, if any.
    pub const fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// Returns the registry this class was defined in.
    pub const fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Returns the class options.
    pub const fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// Returns `true` if this class is `other` or extends it.
    pub fn is_subclass_of(&self, other: ClassId) -> bool {
        self.id == other || self.parent.as_ref().is_some_and(|p| p.is_subclass_of(other))
    }

    // ── Class-level namespace ────────────────────────────────────────

    /// Looks up a class-level member on this class or its ancestors.
    pub fn static_member(&self, name: &str) -> Option<StaticMember> {
        let own = self
            .static_members
            .read()
            .expect("class member lock poisoned")
            .get(name)
            .cloned();
        own.or_else(|| self.parent.as_ref().and_then(|p| p.static_member(name)))
    }

    /// Returns `true` if a class-level member called `name` is visible.
    pub fn has_static_member(&self, name: &str) -> bool {
        self.static_member(name).is_some()
    }

    /// Names of the class-level members defined directly on this class.
    pub fn own_static_member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .static_members
            .read()
            .expect("class member lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub(crate) fn insert_static_member(&self, name: String, member: StaticMember) {
        self.static_members
            .write()
            .expect("class member lock poisoned")
            .insert(name, member);
    }

    /// Calls a class-level method (or reads a property) by name.
    ///
    /// Boot hooks are callable too and return `Null`.
    pub fn call_static(self: &Arc<Self>, name: &str, args: &[Value]) -> ModelResult<Value> {
        match self.static_member(name) {
            Some(StaticMember::Method(method)) => method(self, args),
            Some(StaticMember::Property(value)) => Ok(value),
            Some(StaticMember::Boot(hook)) => hook(self).map(|()| Value::Null),
            None => Err(self.undefined(name)),
        }
    }

    /// Returns a class property (`unguarded`, `snakeAttributes`, ...).
    pub fn property(&self, name: &str) -> Option<Value> {
        match self.static_member(name)? {
            StaticMember::Property(value) => Some(value),
            StaticMember::Method(_) | StaticMember::Boot(_) => None,
        }
    }

    /// Sets a class property on this class (not on its ancestors).
    pub fn set_property(&self, name: &str, value: Value) {
        self.insert_static_member(name.to_string(), StaticMember::Property(value));
    }

    // ── Instance-level namespace ─────────────────────────────────────

    /// Looks up an instance-level member on this class or its ancestors.
    pub fn instance_member(&self, name: &str) -> Option<InstanceMember> {
        let own = self
            .instance_members
            .read()
            .expect("class member lock poisoned")
            .get(name)
            .cloned();
        own.or_else(|| self.parent.as_ref().and_then(|p| p.instance_member(name)))
    }

    /// Returns `true` if an instance-level member called `name` is visible.
    pub fn has_instance_member(&self, name: &str) -> bool {
        self.instance_member(name).is_some()
    }

    pub(crate) fn insert_instance_member(&self, name: String, member: InstanceMember) {
        self.instance_members
            .write()
            .expect("class member lock poisoned")
            .insert(name, member);
    }

    // ── Boot ─────────────────────────────────────────────────────────

    /// The class "boot" procedure: boots the applied traits, then runs the
    /// class's own boot callbacks in registration order.
    pub fn boot(self: &Arc<Self>) -> ModelResult<()> {
        self.registry.booter().boot_traits(self)?;
        for callback in &self.boot_callbacks {
            callback(self)?;
        }
        Ok(())
    }

    // ── Mutators ─────────────────────────────────────────────────────

    // Mutators are keyed by the studly form of the attribute
    // (`first_name` and `firstName` share `FirstName`).

    pub(crate) fn get_mutator(&self, key: &str) -> Option<&GetMutator> {
        self.get_mutators.get(&studly_case(key))
    }

    pub(crate) fn set_mutator(&self, key: &str) -> Option<&SetMutator> {
        self.set_mutators.get(&studly_case(key))
    }

    /// Returns the attributes that have a get mutator, sorted.
    ///
    /// Names are snake cased while the `snakeAttributes` class property is
    /// true. The list is computed on first use and cached for the lifetime
    /// of the class.
    pub fn mutated_attributes(&self) -> &[String] {
        self.mutator_cache.get_or_init(|| {
            let snake = self
                .property("snakeAttributes")
                .and_then(|v| v.as_bool())
                .unwrap_or(true);
            let mut keys: Vec<String> = self
                .get_mutators
                .keys()
                .map(|key| if snake { snake_case(key) } else { key.clone() })
                .collect();
            keys.sort();
            keys
        })
    }

    pub(crate) fn undefined(&self, member: &str) -> ModelError {
        ModelError::UndefinedMember {
            class: self.name.clone(),
            member: member.to_string(),
        }
    }
}

/// Builds a [`ModelClass`].
///
/// # Examples
///
/// ```
/// use modelkit_db::{ModelClass, ModelRegistry};
///
/// let registry = ModelRegistry::new();
/// let user = registry.define(
///     ModelClass::builder("User")
///         .table("users")
///         .fillable(["name", "email"])
///         .cast("is_admin", "bool"),
/// );
/// assert_eq!(user.name(), "User");
/// assert_eq!(user.meta().table.as_deref(), Some("users"));
/// ```
pub struct ClassBuilder {
    pub(crate) name: String,
    pub(crate) parent: Option<Arc<ModelClass>>,
    pub(crate) meta: ModelMeta,
    pub(crate) get_mutators: HashMap<String, GetMutator>,
    pub(crate) set_mutators: HashMap<String, SetMutator>,
    pub(crate) boot_callbacks: Vec<BootHook>,
    pub(crate) traits: Vec<Arc<TraitBundle>>,
    per_page_set: bool,
    date_format_set: bool,
    timestamps_set: bool,
}

impl ClassBuilder {
    /// Creates a builder for a class called `name` with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            meta: ModelMeta::default(),
            get_mutators: HashMap::new(),
            set_mutators: HashMap::new(),
            boot_callbacks: Vec::new(),
            traits: Vec::new(),
            per_page_set: false,
            date_format_set: false,
            timestamps_set: false,
        }
    }

    /// Extends `parent`: starts from its defaults and mutators.
    #[must_use]
    pub fn extends(mut self, parent: &Arc<ModelClass>) -> Self {
        self.meta = parent.meta.clone();
        self.get_mutators.clone_from(&parent.get_mutators);
        self.set_mutators.clone_from(&parent.set_mutators);
        self.parent = Some(Arc::clone(parent));
        self.per_page_set = true;
        self.date_format_set = true;
        self.timestamps_set = true;
        self
    }

    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.meta.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn connection(mut self, connection: impl Into<String>) -> Self {
        self.meta.connection = Some(connection.into());
        self
    }

    #[must_use]
    pub fn primary_key(mut self, key: impl Into<String>, key_type: impl Into<String>) -> Self {
        self.meta.primary_key = key.into();
        self.meta.key_type = key_type.into();
        self
    }

    #[must_use]
    pub const fn incrementing(mut self, incrementing: bool) -> Self {
        self.meta.incrementing = incrementing;
        self
    }

    #[must_use]
    pub const fn per_page(mut self, per_page: usize) -> Self {
        self.meta.per_page = per_page;
        self.per_page_set = true;
        self
    }

    #[must_use]
    pub const fn timestamps(mut self, timestamps: bool) -> Self {
        self.meta.timestamps = timestamps;
        self.timestamps_set = true;
        self
    }

    /// Replaces the mass assignable attributes.
    #[must_use]
    pub fn fillable<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.fillable = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the guarded attributes.
    #[must_use]
    pub fn guarded<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.guarded = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Declares a cast for `key` (`int`, `bool`, `json`, `decimal:2`, ...).
    #[must_use]
    pub fn cast(mut self, key: impl Into<String>, cast: impl Into<String>) -> Self {
        self.meta.casts.insert(key.into(), cast.into());
        self
    }

    /// Declares date attributes.
    #[must_use]
    pub fn dates<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.dates.extend(keys.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.meta.date_format = Some(format.into());
        self.date_format_set = true;
        self
    }

    /// Appends an accessor to the array form.
    #[must_use]
    pub fn append(mut self, key: impl Into<String>) -> Self {
        self.meta.appends.push(key.into());
        self
    }

    /// Adds user-defined observable events.
    #[must_use]
    pub fn observables<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta
            .observables
            .extend(events.into_iter().map(Into::into));
        self
    }

    /// Fires `custom` in place of the native `event`.
    #[must_use]
    pub fn dispatches_event(mut self, event: impl Into<String>, custom: CustomEvent) -> Self {
        self.meta.dispatches_events.insert(event.into(), custom);
        self
    }

    /// Relations to eager load on every query.
    #[must_use]
    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.with = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Relation counts to eager load on every query.
    #[must_use]
    pub fn with_count<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta.with_count = relations.into_iter().map(Into::into).collect();
        self
    }

    /// Registers a get mutator for `key`.
    #[must_use]
    pub fn get_mutator<F>(mut self, key: impl Into<String>, mutator: F) -> Self
    where
        F: Fn(&Model, Value) -> Value + Send + Sync + 'static,
    {
        self.get_mutators
            .insert(studly_case(&key.into()), Arc::new(mutator));
        self
    }

    /// Registers a set mutator for `key`.
    #[must_use]
    pub fn set_mutator<F>(mut self, key: impl Into<String>, mutator: F) -> Self
    where
        F: Fn(&mut Model, Value) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.set_mutators
            .insert(studly_case(&key.into()), Arc::new(mutator));
        self
    }

    /// Runs `callback` at the end of the class's one-time boot, after the
    /// trait boot hooks.
    #[must_use]
    pub fn on_boot<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Arc<ModelClass>) -> ModelResult<()> + Send + Sync + 'static,
    {
        self.boot_callbacks.push(Arc::new(callback));
        self
    }

    /// Applies `bundle` to the class when it is defined. Bundles are
    /// applied in the order they are added.
    #[must_use]
    pub fn with_trait(mut self, bundle: &Arc<TraitBundle>) -> Self {
        self.traits.push(Arc::clone(bundle));
        self
    }

    pub(crate) fn apply_settings(&mut self, settings: &Settings) {
        if !self.per_page_set {
            self.meta.per_page = settings.per_page;
        }
        if !self.date_format_set {
            self.meta.date_format = Some(settings.date_format.clone());
        }
        if !self.timestamps_set {
            self.meta.timestamps = settings.timestamps;
        }
    }

    pub(crate) fn build(self, registry: Arc<ModelRegistry>) -> (Arc<ModelClass>, Vec<Arc<TraitBundle>>) {
        let id = ClassId::next();
        let class = Arc::new(ModelClass {
            id,
            event_scope: format!("{}#{}", self.name, id.0),
            name: self.name,
            parent: self.parent,
            registry,
            static_members: RwLock::new(HashMap::new()),
            instance_members: RwLock::new(HashMap::new()),
            meta: self.meta,
            get_mutators: self.get_mutators,
            set_mutators: self.set_mutators,
            boot_callbacks: self.boot_callbacks,
            mutator_cache: OnceLock::new(),
        });
        (class, self.traits)
    }
}
