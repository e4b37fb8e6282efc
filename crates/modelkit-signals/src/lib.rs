//! # modelkit-signals
//!
//! Signals and the event dispatcher used by modelkit models. A [`Signal`]
//! is an ordered list of receivers for one payload type; the
//! [`Dispatcher`] trait is the pluggable contract the model layer fires
//! lifecycle events through, and [`EventDispatcher`] is the bundled
//! implementation built from signals keyed by event name and model class.
//!
//! ## Usage
//!
//! ```
//! use modelkit_signals::Signal;
//! use std::sync::Arc;
//!
//! struct UserCreated;
//!
//! let signal: Signal<UserCreated> = Signal::new();
//!
//! signal.connect("my_handler", Arc::new(|_sender: &UserCreated| {
//!     println!("A user was created!");
//!     None
//! }));
//!
//! let results = signal.send(&UserCreated);
//! assert_eq!(results.len(), 1);
//! ```

pub mod dispatcher;

use std::any::Any;
use std::sync::{Arc, RwLock};

pub use dispatcher::{event_key, Dispatcher, EventDispatcher, Listener, Payload, Response};

/// The type signature for a signal receiver callback.
///
/// Receivers accept a reference to the signal payload and may optionally
/// return a boxed value. Receivers must be `Send + Sync` so that signals
/// can be dispatched from any thread.
pub type SignalReceiver<T> = Arc<dyn Fn(&T) -> Option<Box<dyn Any + Send>> + Send + Sync>;

/// A signal that can be connected to and dispatched.
///
/// Each signal carries a payload type `T`, which may be unsized
/// (`Signal<Payload>` carries arbitrary payloads). Receivers are called in
/// the order they were connected.
///
/// # Examples
///
/// ```
/// use modelkit_signals::Signal;
/// use std::sync::Arc;
///
/// let signal: Signal<String> = Signal::new();
///
/// signal.connect("logger", Arc::new(|msg: &String| {
///     println!("Received: {msg}");
///     None
/// }));
///
/// signal.send(&"hello".to_string());
/// ```
pub struct Signal<T: ?Sized + 'static> {
    receivers: RwLock<Vec<(Option<String>, SignalReceiver<T>)>>,
}

impl<T: ?Sized + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + 'static> Signal<T> {
    /// Creates a new signal with no connected receivers.
    pub fn new() -> Self {
        Self {
            receivers: RwLock::new(Vec::new()),
        }
    }

    /// Connects a receiver to this signal.
    ///
    /// The `receiver_id` is used to identify the receiver for later disconnection.
    /// If a receiver with the same ID is already connected, it is replaced.
    pub fn connect(&self, receiver_id: impl Into<String>, callback: SignalReceiver<T>) {
        let id = receiver_id.into();
        let mut receivers = self.receivers.write().expect("signal lock poisoned");

        // Replace if already connected with this ID
        if let Some(entry) = receivers
            .iter_mut()
            .find(|(rid, _)| rid.as_deref() == Some(id.as_str()))
        {
            entry.1 = callback;
        } else {
            receivers.push((Some(id), callback));
        }
    }

    /// Appends an anonymous receiver. It can only be removed by [`clear`](Self::clear).
    pub fn append(&self, callback: SignalReceiver<T>) {
        self.receivers
            .write()
            .expect("signal lock poisoned")
            .push((None, callback));
    }

    /// Disconnects the receiver with the given ID.
    ///
    /// Returns `true` if a receiver was found and removed.
    pub fn disconnect(&self, receiver_id: &str) -> bool {
        let mut receivers = self.receivers.write().expect("signal lock poisoned");
        let len_before = receivers.len();
        receivers.retain(|(id, _)| id.as_deref() != Some(receiver_id));
        receivers.len() < len_before
    }

    /// Disconnects every receiver.
    pub fn clear(&self) {
        self.receivers.write().expect("signal lock poisoned").clear();
    }

    /// Sends the signal to all connected receivers.
    ///
    /// Receivers are called in connection order. Returns a vector of the
    /// return values from each receiver. The receiver list is snapshotted
    /// before the first call, so receivers may connect or disconnect
    /// other receivers while the signal is being sent.
    pub fn send(&self, sender: &T) -> Vec<Option<Box<dyn Any + Send>>> {
        self.snapshot()
            .iter()
            .map(|callback| callback(sender))
            .collect()
    }

    /// Sends the signal until a receiver returns a value.
    ///
    /// Receivers after the first one returning `Some` are not called.
    pub fn send_until(&self, sender: &T) -> Option<Box<dyn Any + Send>> {
        self.snapshot()
            .iter()
            .find_map(|callback| callback(sender))
    }

    /// Returns the number of connected receivers.
    pub fn receiver_count(&self) -> usize {
        self.receivers.read().expect("signal lock poisoned").len()
    }

    fn snapshot(&self) -> Vec<SignalReceiver<T>> {
        self.receivers
            .read()
            .expect("signal lock poisoned")
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_signal_connect_and_send() {
        let signal: Signal<String> = Signal::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        signal.connect(
            "counter",
            Arc::new(move |_: &String| {
                count_clone.fetch_add(1, Ordering::SeqCst);
                None
            }),
        );

        let results = signal.send(&"hello".to_string());
        assert_eq!(results.len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal: Signal<()> = Signal::new();

        signal.connect("a", Arc::new(|(): &()| None));
        signal.connect("b", Arc::new(|(): &()| None));
        assert_eq!(signal.receiver_count(), 2);

        assert!(signal.disconnect("a"));
        assert_eq!(signal.receiver_count(), 1);

        assert!(!signal.disconnect("nonexistent"));
        assert_eq!(signal.receiver_count(), 1);
    }

    #[test]
    fn test_signal_replace_receiver() {
        let signal: Signal<()> = Signal::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        signal.connect("handler", Arc::new(|(): &()| None));
        signal.connect(
            "handler",
            Arc::new(move |(): &()| {
                count_clone.fetch_add(1, Ordering::SeqCst);
                None
            }),
        );

        assert_eq!(signal.receiver_count(), 1);
        signal.send(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_anonymous_receivers_survive_disconnect() {
        let signal: Signal<()> = Signal::new();
        signal.append(Arc::new(|(): &()| None));
        signal.append(Arc::new(|(): &()| None));
        signal.connect("named", Arc::new(|(): &()| None));

        assert!(signal.disconnect("named"));
        assert_eq!(signal.receiver_count(), 2);

        signal.clear();
        assert_eq!(signal.receiver_count(), 0);
    }

    #[test]
    fn test_send_until_stops_at_first_value() {
        let signal: Signal<i32> = Signal::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        signal.connect(
            "silent",
            Arc::new(move |_: &i32| {
                c.fetch_add(1, Ordering::SeqCst);
                None
            }),
        );
        signal.connect(
            "answer",
            Arc::new(|val: &i32| Some(Box::new(val * 2) as Box<dyn Any + Send>)),
        );
        let c = calls.clone();
        signal.connect(
            "never",
            Arc::new(move |_: &i32| {
                c.fetch_add(100, Ordering::SeqCst);
                None
            }),
        );

        let result = signal.send_until(&21).unwrap();
        assert_eq!(*result.downcast_ref::<i32>().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_receiver_may_disconnect_during_send() {
        let signal: Arc<Signal<()>> = Arc::new(Signal::new());
        let weak = Arc::downgrade(&signal);
        signal.connect(
            "once",
            Arc::new(move |(): &()| {
                if let Some(signal) = weak.upgrade() {
                    signal.disconnect("once");
                }
                None
            }),
        );

        assert_eq!(signal.send(&()).len(), 1);
        assert_eq!(signal.receiver_count(), 0);
    }

    #[test]
    fn test_dyn_any_payload() {
        let signal: Signal<Payload> = Signal::new();
        signal.append(Arc::new(|payload: &Payload| {
            payload
                .downcast_ref::<u8>()
                .map(|v| Box::new(u16::from(*v) + 1) as Box<dyn Any + Send>)
        }));

        let results = signal.send(&7_u8);
        assert_eq!(*results[0].as_ref().unwrap().downcast_ref::<u16>().unwrap(), 8);
        assert!(signal.send(&"not a u8").pop().unwrap().is_none());
    }

    #[test]
    fn test_empty_signal_send() {
        let signal: Signal<()> = Signal::default();
        assert!(signal.send(&()).is_empty());
        assert!(signal.send_until(&()).is_none());
    }
}
