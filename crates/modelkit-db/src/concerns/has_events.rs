//! Model events.
//!
//! Events are fired through the registry's [`Dispatcher`] under the key
//! `modelkit.{event}: {Class}` with the model as payload. A class may map an
//! event to a [`CustomEvent`], which is dispatched first under its own name
//! with no class. Without a dispatcher every event is silently dropped.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use modelkit_signals::{Dispatcher, Payload, Response};

use crate::class::ModelClass;
use crate::model::Model;
use crate::traits::TraitBundle;
use crate::value::Value;

use super::{string_args, string_list};

/// The events every model can be observed for.
pub const OBSERVABLE_EVENTS: [&str; 12] = [
    "retrieved",
    "creating",
    "created",
    "updating",
    "updated",
    "saving",
    "saved",
    "restoring",
    "restored",
    "deleting",
    "deleted",
    "forceDeleted",
];

static BUNDLE: Lazy<Arc<TraitBundle>> = Lazy::new(|| {
    TraitBundle::builder("HasEvents")
        .method("getObservableEvents", |model, _| {
            Ok(string_list(&model.get_observable_events()))
        })
        .method("addObservableEvents", |model, args| {
            model.add_observable_events(string_args(args));
            Ok(Value::Null)
        })
        .method("removeObservableEvents", |model, args| {
            model.remove_observable_events(&string_args(args));
            Ok(Value::Null)
        })
        .static_method("flushEventListeners", |class, _| {
            class.flush_event_listeners();
            Ok(Value::Null)
        })
        .build()
});

/// The `HasEvents` bundle.
pub fn bundle() -> Arc<TraitBundle> {
    Arc::clone(&BUNDLE)
}

type EventFactory = Arc<dyn Fn(&Model) -> Box<dyn Any> + Send + Sync>;

/// An event object fired in place of a native model event.
///
/// # Examples
///
/// ```
/// use modelkit_db::concerns::has_events::CustomEvent;
///
/// struct UserSaved {
///     name: String,
/// }
///
/// let event = CustomEvent::new("UserSaved", |model| {
///     let name = model.get_attribute("name").map(|v| v.to_string()).unwrap_or_default();
///     Box::new(UserSaved { name })
/// });
/// assert_eq!(event.name(), "UserSaved");
/// ```
#[derive(Clone)]
pub struct CustomEvent {
    name: String,
    factory: EventFactory,
}

impl fmt::Debug for CustomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomEvent").field("name", &self.name).finish_non_exhaustive()
    }
}

impl CustomEvent {
    /// Creates a custom event named `name` built from the model by
    /// `factory`.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Model) -> Box<dyn Any> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// The name the event is dispatched under.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn build(&self, model: &Model) -> Box<dyn Any> {
        (self.factory)(model)
    }
}

/// An object reacting to several events of one class.
pub trait ModelObserver: Send + Sync {
    /// Whether the observer wants `event`.
    fn handles(&self, event: &str) -> bool;

    /// Handles `event`. Returning `Some(false)` from a halting event
    /// cancels the operation.
    fn handle(&self, event: &str, model: &Model) -> Option<bool>;
}

fn is_false(response: &Response) -> bool {
    response.downcast_ref::<bool>() == Some(&false)
}

impl ModelClass {
    /// The observable events of this class: the standard ones followed by
    /// the class's own.
    pub fn observable_events(&self) -> Vec<String> {
        let mut events: Vec<String> = OBSERVABLE_EVENTS.iter().map(ToString::to_string).collect();
        for event in &self.meta().observables {
            if !events.contains(event) {
                events.push(event.clone());
            }
        }
        events
    }

    /// Registers `handler` for `event` on this class. Does nothing without
    /// a dispatcher.
    pub fn register_model_event<F>(&self, event: &str, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        let Some(dispatcher) = self.registry().event_dispatcher() else {
            return;
        };
        tracing::trace!(class = self.name(), event, "model event listener registered");
        dispatcher.listen(
            event,
            Some(self.event_scope()),
            Arc::new(move |payload: &Payload| {
                payload
                    .downcast_ref::<Model>()
                    .and_then(&handler)
                    .map(|result| Box::new(result) as Response)
            }),
        );
    }

    pub fn retrieved<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("retrieved", handler);
    }

    pub fn saving<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("saving", handler);
    }

    pub fn saved<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("saved", handler);
    }

    pub fn updating<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("updating", handler);
    }

    pub fn updated<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("updated", handler);
    }

    pub fn creating<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("creating", handler);
    }

    pub fn created<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("created", handler);
    }

    pub fn deleting<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("deleting", handler);
    }

    pub fn deleted<F>(&self, handler: F)
    where
        F: Fn(&Model) -> Option<bool> + Send + Sync + 'static,
    {
        self.register_model_event("deleted", handler);
    }

    /// Registers `observer` for every observable event it handles.
    pub fn observe(&self, observer: &Arc<dyn ModelObserver>) {
        for event in self.observable_events() {
            if !observer.handles(&event) {
                continue;
            }
            let observer = Arc::clone(observer);
            let name = event.clone();
            self.register_model_event(&event, move |model| observer.handle(&name, model));
        }
    }

    /// Forgets every listener of this class's observable events and of
    /// its custom events.
    pub fn flush_event_listeners(&self) {
        let Some(dispatcher) = self.registry().event_dispatcher() else {
            return;
        };
        for event in self.observable_events() {
            dispatcher.forget(&event, Some(self.event_scope()));
        }
        for custom in self.meta().dispatches_events.values() {
            dispatcher.forget(custom.name(), None);
        }
        tracing::debug!(class = self.name(), "event listeners flushed");
    }
}

impl Model {
    /// The observable events of this model.
    pub fn get_observable_events(&self) -> Vec<String> {
        let mut events: Vec<String> = OBSERVABLE_EVENTS.iter().map(ToString::to_string).collect();
        for event in &self.meta.observables {
            if !events.contains(event) {
                events.push(event.clone());
            }
        }
        events
    }

    /// Replaces the user-defined observable events.
    pub fn set_observable_events(&mut self, events: Vec<String>) -> &mut Self {
        self.meta.observables = events;
        self
    }

    /// Adds user-defined observable events, skipping duplicates.
    pub fn add_observable_events<I, S>(&mut self, events: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for event in events {
            let event = event.into();
            if !self.meta.observables.contains(&event) {
                self.meta.observables.push(event);
            }
        }
        self
    }

    /// Removes user-defined observable events.
    pub fn remove_observable_events(&mut self, events: &[String]) -> &mut Self {
        self.meta.observables.retain(|e| !events.contains(e));
        self
    }

    /// Fires `event` for this model and reports whether the operation may
    /// proceed.
    ///
    /// With `halt`, listeners run until one answers and a `false` answer
    /// returns `false`. A custom event mapped to `event` is fired first;
    /// if it gets an answer the native event is not fired.
    pub fn fire_model_event(&self, event: &str, halt: bool) -> bool {
        let Some(dispatcher) = self.class().registry().event_dispatcher() else {
            return true;
        };
        if let Some(result) = self.fire_custom_model_event(dispatcher.as_ref(), event, halt) {
            return result;
        }

        let scope = self.class().event_scope();
        tracing::trace!(class = scope, event, halt, "firing model event");
        if halt {
            dispatcher
                .until(event, Some(scope), self)
                .map_or(true, |response| !is_false(&response))
        } else {
            dispatcher.dispatch(event, Some(scope), self);
            true
        }
    }

    fn fire_custom_model_event(
        &self,
        dispatcher: &dyn Dispatcher,
        event: &str,
        halt: bool,
    ) -> Option<bool> {
        let custom = self.meta.dispatches_events.get(event)?;
        let payload = custom.build(self);
        tracing::trace!(class = self.class().name(), event, custom = custom.name(), "firing custom model event");

        if halt {
            return dispatcher
                .until(custom.name(), None, &*payload)
                .map(|response| !is_false(&response));
        }
        let responses: Vec<Response> = dispatcher
            .dispatch(custom.name(), None, &*payload)
            .into_iter()
            .flatten()
            .collect();
        if responses.is_empty() {
            None
        } else {
            Some(!responses.iter().any(is_false))
        }
    }
}
