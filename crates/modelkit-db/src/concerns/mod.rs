//! The default concerns every model class defined through
//! [`ModelRegistry::define`](crate::registry::ModelRegistry::define) is
//! composed from.
//!
//! Each concern exposes a [`TraitBundle`](crate::traits::TraitBundle)
//! (reachable by name through [`ModelClass::call_static`] and
//! [`Model::call`]) and the same behaviour as typed methods on
//! [`ModelClass`] and [`Model`].
//!
//! [`ModelClass`]: crate::class::ModelClass
//! [`ModelClass::call_static`]: crate::class::ModelClass::call_static
//! [`Model`]: crate::model::Model
//! [`Model::call`]: crate::model::Model::call

pub mod guards_attributes;
pub mod has_attributes;
pub mod has_events;

use crate::value::Value;

fn string_list(items: &[String]) -> Value {
    Value::List(items.iter().map(|s| Value::String(s.clone())).collect())
}

fn string_args(args: &[Value]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| match arg {
            Value::List(items) => items.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        })
        .collect()
}
