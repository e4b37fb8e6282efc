//! The model event dispatcher.
//!
//! Model classes fire lifecycle events (`booting`, `creating`, `saved`, ...)
//! through whatever [`Dispatcher`] their registry holds. Listeners are
//! registered per (event, class) pair; custom event objects are registered
//! under a bare event name with no class.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::{Signal, SignalReceiver};

/// The payload type carried by dispatched events.
pub type Payload = dyn Any;

/// A value returned by a listener.
pub type Response = Box<dyn Any + Send>;

/// A listener callback registered with a dispatcher.
pub type Listener = SignalReceiver<Payload>;

/// Builds the key listeners are stored under.
///
/// Class-bound events use `modelkit.{event}: {class}`; events without a
/// class (custom event objects) use the bare event name.
///
/// # Examples
///
/// ```
/// use modelkit_signals::event_key;
///
/// assert_eq!(event_key("saving", Some("User")), "modelkit.saving: User");
/// assert_eq!(event_key("UserSaved", None), "UserSaved");
/// ```
pub fn event_key(event: &str, class: Option<&str>) -> String {
    match class {
        Some(class) => format!("modelkit.{event}: {class}"),
        None => event.to_string(),
    }
}

/// The contract between the model layer and an event dispatcher.
///
/// Implementations must be `Send + Sync` because a registry may be shared
/// between threads.
pub trait Dispatcher: Send + Sync {
    /// Registers a listener for `event` fired by `class`.
    fn listen(&self, event: &str, class: Option<&str>, listener: Listener);

    /// Removes every listener for `event` fired by `class`.
    fn forget(&self, event: &str, class: Option<&str>);

    /// Calls every listener and collects their responses.
    fn dispatch(&self, event: &str, class: Option<&str>, payload: &Payload)
        -> Vec<Option<Response>>;

    /// Calls listeners until one returns a response, and returns it.
    fn until(&self, event: &str, class: Option<&str>, payload: &Payload) -> Option<Response>;

    /// Returns `true` if any listener is registered for `event` and `class`.
    fn has_listeners(&self, event: &str, class: Option<&str>) -> bool;
}

/// The bundled [`Dispatcher`], one [`Signal`] per event key.
///
/// # Examples
///
/// ```
/// use modelkit_signals::{Dispatcher, EventDispatcher, Payload};
/// use std::sync::Arc;
///
/// let dispatcher = EventDispatcher::new();
/// dispatcher.listen("saving", Some("User"), Arc::new(|_: &Payload| None));
/// assert!(dispatcher.has_listeners("saving", Some("User")));
/// assert!(!dispatcher.has_listeners("saving", Some("Post")));
/// ```
#[derive(Default)]
pub struct EventDispatcher {
    signals: RwLock<HashMap<String, Arc<Signal<Payload>>>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the signal for `key`, creating it if it does not exist.
    fn get_or_create(&self, key: String) -> Arc<Signal<Payload>> {
        {
            let signals = self.signals.read().expect("dispatcher lock poisoned");
            if let Some(signal) = signals.get(&key) {
                return Arc::clone(signal);
            }
        }

        let mut signals = self.signals.write().expect("dispatcher lock poisoned");
        Arc::clone(
            signals
                .entry(key)
                .or_insert_with(|| Arc::new(Signal::new())),
        )
    }

    fn get(&self, key: &str) -> Option<Arc<Signal<Payload>>> {
        self.signals
            .read()
            .expect("dispatcher lock poisoned")
            .get(key)
            .cloned()
    }
}

impl Dispatcher for EventDispatcher {
    fn listen(&self, event: &str, class: Option<&str>, listener: Listener) {
        let key = event_key(event, class);
        tracing::trace!(key = %key, "listener registered");
        self.get_or_create(key).append(listener);
    }

    fn forget(&self, event: &str, class: Option<&str>) {
        let key = event_key(event, class);
        if self
            .signals
            .write()
            .expect("dispatcher lock poisoned")
            .remove(&key)
            .is_some()
        {
            tracing::trace!(key = %key, "listeners forgotten");
        }
    }

    fn dispatch(
        &self,
        event: &str,
        class: Option<&str>,
        payload: &Payload,
    ) -> Vec<Option<Response>> {
        self.get(&event_key(event, class))
            .map(|signal| signal.send(payload))
            .unwrap_or_default()
    }

    fn until(&self, event: &str, class: Option<&str>, payload: &Payload) -> Option<Response> {
        self.get(&event_key(event, class))
            .and_then(|signal| signal.send_until(payload))
    }

    fn has_listeners(&self, event: &str, class: Option<&str>) -> bool {
        self.get(&event_key(event, class))
            .is_some_and(|signal| signal.receiver_count() > 0)
    }
}
