//! Model instances.
//!
//! A [`Model`] is one record of a [`ModelClass`]. Construction boots the
//! class if needed, runs the class's instance initializers, snapshots the
//! original attributes and mass assigns the given attributes, in that
//! order. The guard, attribute and event behaviour lives in
//! [`concerns`](crate::concerns).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use modelkit_core::utils::text::remove_table_prefix;
use modelkit_core::{ModelError, ModelResult};

use crate::class::{InstanceMember, ModelClass, ModelMeta};
use crate::value::Value;

/// A model instance.
///
/// # Examples
///
/// ```
/// use modelkit_db::{Model, ModelClass, ModelRegistry, Value};
///
/// let registry = ModelRegistry::new();
/// let post = registry.define(ModelClass::builder("Post").fillable(["title"]));
///
/// let mut model = Model::with_attributes(&post, [("title", "Hello")]).unwrap();
/// assert!(model.is_dirty(&["title"]));
///
/// model.sync_original();
/// assert!(model.is_clean(&[]));
///
/// model.set_attribute("title", Value::from("Bye")).unwrap();
/// assert!(model.is_dirty(&["title"]));
/// ```
pub struct Model {
    class: Arc<ModelClass>,
    pub(crate) meta: ModelMeta,
    pub(crate) attributes: BTreeMap<String, Value>,
    pub(crate) original: BTreeMap<String, Value>,
    pub(crate) changes: BTreeMap<String, Value>,
    /// Whether the model exists in storage.
    pub exists: bool,
    /// Whether the model was inserted during the current lifecycle.
    pub was_recently_created: bool,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("class", &self.class.name())
            .field("attributes", &self.attributes)
            .field("exists", &self.exists)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Constructs a model with no attributes.
    pub fn new(class: &Arc<ModelClass>) -> ModelResult<Self> {
        Self::with_attributes(class, Vec::<(String, Value)>::new())
    }

    /// Constructs a model and mass assigns `attributes`.
    ///
    /// Boot hook, initializer and mass-assignment errors are returned
    /// unchanged.
    pub fn with_attributes<I, K, V>(class: &Arc<ModelClass>, attributes: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut model = Self::blank(class);
        let registry = Arc::clone(class.registry());

        registry.booter().boot_if_not_booted(&model)?;
        registry.booter().initialize_traits(&mut model)?;
        model.sync_original();
        model.fill(attributes)?;
        Ok(model)
    }

    fn blank(class: &Arc<ModelClass>) -> Self {
        Self {
            class: Arc::clone(class),
            meta: class.meta().clone(),
            attributes: BTreeMap::new(),
            original: BTreeMap::new(),
            changes: BTreeMap::new(),
            exists: false,
            was_recently_created: false,
        }
    }

    /// The class of this model.
    pub const fn class(&self) -> &Arc<ModelClass> {
        &self.class
    }

    /// This model's options, copied from the class at construction.
    pub const fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// The table associated with the model.
    ///
    /// Defaults to the snake-cased class name with an `s` appended.
    pub fn table(&self) -> String {
        self.meta.table.clone().unwrap_or_else(|| {
            format!(
                "{}s",
                modelkit_core::utils::text::snake_case(self.class.name())
            )
        })
    }

    /// Sets the table associated with the model.
    pub fn set_table(&mut self, table: impl Into<String>) -> &mut Self {
        self.meta.table = Some(table.into());
        self
    }

    /// The primary key column.
    pub fn key_name(&self) -> &str {
        &self.meta.primary_key
    }

    /// The primary key value.
    pub fn key(&self) -> Value {
        self.attributes
            .get(&self.meta.primary_key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// The primary key qualified by the table (`users.id`).
    pub fn qualified_key_name(&self) -> String {
        format!("{}.{}", self.table(), self.meta.primary_key)
    }

    /// Number of models per page.
    pub const fn per_page(&self) -> usize {
        self.meta.per_page
    }

    /// Whether `created_at`/`updated_at` are maintained.
    pub const fn uses_timestamps(&self) -> bool {
        self.meta.timestamps
    }

    /// Mass assigns `attributes`.
    ///
    /// Table-qualified keys are stripped of their prefix. Keys that are
    /// not fillable are dropped, unless the model is totally guarded, in
    /// which case the first such key fails with
    /// [`ModelError::MassAssignment`].
    pub fn fill<I, K, V>(&mut self, attributes: I) -> ModelResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let attributes: Vec<(String, Value)> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let totally_guarded = self.totally_guarded();

        for (key, value) in self.fillable_from_array(attributes) {
            let key = remove_table_prefix(&key);
            if self.is_fillable(&key) {
                self.set_attribute(&key, value)?;
            } else if totally_guarded {
                return Err(ModelError::MassAssignment {
                    key,
                    class: self.class.name().to_string(),
                });
            }
        }
        Ok(self)
    }

    /// Mass assigns `attributes` with the guard lifted.
    pub fn force_fill<I, K, V>(&mut self, attributes: I) -> ModelResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let class = Arc::clone(&self.class);
        class.unguarded(|| self.fill(attributes).map(|_| ()))?;
        Ok(self)
    }

    /// Calls an instance-level member by name.
    pub fn call(&mut self, name: &str, args: &[Value]) -> ModelResult<Value> {
        match self.class.instance_member(name) {
            Some(InstanceMember::Method(method)) => method(self, args),
            Some(InstanceMember::Initializer(init)) => init(self).map(|()| Value::Null),
            None => Err(self.class.undefined(name)),
        }
    }

    /// Calls a class-level member of this model's class by name.
    pub fn call_static(&self, name: &str, args: &[Value]) -> ModelResult<Value> {
        self.class.call_static(name, args)
    }
}
