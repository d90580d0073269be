//! Event Dispatcher
//!
//! Listener registry keyed by event type. Listeners are invoked
//! synchronously, in registration order, on the dispatching thread.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::types::Event;
use crate::socket::ClientHandle;
use crate::sync::lock;

/// A registered callback
///
/// Identity is the `Arc` allocation: registering a clone of the same
/// listener twice for one event type is a no-op.
pub type Listener = Arc<dyn Fn(&Delivery) + Send + Sync>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Delivery) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// What a listener receives
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Browser-style single event argument
    Event(Event),
    /// Socket.IO-style positional payload arguments
    Args(Vec<Value>),
    /// A newly connected client (server `connection` / `connect` listeners)
    Connection(ClientHandle),
}

impl Delivery {
    /// The event, for event-style deliveries
    pub fn event(&self) -> Option<&Event> {
        match self {
            Delivery::Event(event) => Some(event),
            _ => None,
        }
    }

    /// Positional arguments; empty for other deliveries
    pub fn args(&self) -> &[Value] {
        match self {
            Delivery::Args(args) => args,
            _ => &[],
        }
    }

    /// The connecting client, for connection deliveries
    pub fn connection(&self) -> Option<&ClientHandle> {
        match self {
            Delivery::Connection(client) => Some(client),
            _ => None,
        }
    }

    /// First positional argument, or the data of a message event
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Delivery::Args(args) => args.first(),
            Delivery::Event(event) => event.data(),
            Delivery::Connection(_) => None,
        }
    }
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Pub/sub primitive shared by clients and servers
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; a no-op if this exact listener is already registered
    pub fn on(&self, event_type: &str, listener: Listener) {
        let mut listeners = lock(&self.listeners);
        let entry = listeners.entry(event_type.to_string()).or_default();

        if !entry.iter().any(|l| same_listener(l, &listener)) {
            entry.push(listener);
        }
    }

    /// Remove the first registration of this exact listener
    pub fn off(&self, event_type: &str, listener: &Listener) {
        let mut listeners = lock(&self.listeners);
        if let Some(entry) = listeners.get_mut(event_type) {
            if let Some(pos) = entry.iter().position(|l| same_listener(l, listener)) {
                entry.remove(pos);
            }
            if entry.is_empty() {
                listeners.remove(event_type);
            }
        }
    }

    /// Whether any listener is registered for the event type
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.listener_count(event_type) > 0
    }

    /// Number of listeners registered for the event type
    pub fn listener_count(&self, event_type: &str) -> usize {
        lock(&self.listeners)
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Dispatch an event
    ///
    /// Listeners receive the event itself when `extra_args` is empty, or the
    /// extra arguments verbatim otherwise. Returns false if nobody listens.
    pub fn dispatch(&self, event: Event, extra_args: Vec<Value>) -> bool {
        let event_type = event.event_type.clone();
        let delivery = if extra_args.is_empty() {
            Delivery::Event(event)
        } else {
            Delivery::Args(extra_args)
        };
        self.dispatch_delivery(&event_type, delivery)
    }

    /// Invoke every listener for `event_type` with a prepared delivery
    ///
    /// The listener list is snapshotted first, so listeners may register or
    /// remove listeners (or dispatch further events) while running. Listener
    /// panics propagate to the caller.
    pub fn dispatch_delivery(&self, event_type: &str, delivery: Delivery) -> bool {
        let snapshot = match lock(&self.listeners).get(event_type) {
            Some(listeners) if !listeners.is_empty() => listeners.clone(),
            _ => return false,
        };

        for listener in snapshot {
            listener(&delivery);
        }
        true
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<String, usize> = lock(&self.listeners)
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}
