//! Client socket core
//!
//! State shared by both client flavours. The registry, rooms and servers all
//! refer to clients through [`ClientHandle`], whose equality is identity.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

use crate::event::{Delivery, Event, EventDispatcher, EventTarget, Listener};
use crate::registry::{ConnectionRegistry, WeakRegistry};
use crate::sync::lock;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

/// How binary payloads are surfaced (kept for API parity; payloads are JSON)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryType {
    #[default]
    Blob,
    ArrayBuffer,
}

/// Which client API a socket imitates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Browser WebSocket: listeners always get the event object
    WebSocket,
    /// Socket.IO client: message events are unwrapped to their payload
    SocketIo,
}

impl Flavor {
    /// Name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Flavor::WebSocket => "WebSocket",
            Flavor::SocketIo => "SocketIO",
        }
    }
}

struct SocketCore {
    id: Uuid,
    url: String,
    protocol: String,
    flavor: Flavor,
    ready_state: Mutex<ReadyState>,
    binary_type: Mutex<BinaryType>,
    dispatcher: EventDispatcher,
    registry: WeakRegistry,
    /// URL of the registry entry the socket is attached under; differs from
    /// `url` when it was matched by prefix
    attached_to: Mutex<Option<String>>,
}

/// Shared reference to a client socket
#[derive(Clone)]
pub struct ClientHandle {
    core: Arc<SocketCore>,
}

/// Non-owning reference, used by listeners a socket registers on itself
#[derive(Clone)]
pub(crate) struct WeakClient(Weak<SocketCore>);

impl WeakClient {
    pub(crate) fn upgrade(&self) -> Option<ClientHandle> {
        self.0.upgrade().map(|core| ClientHandle { core })
    }
}

impl ClientHandle {
    pub(crate) fn new(
        registry: &ConnectionRegistry,
        url: String,
        protocol: String,
        flavor: Flavor,
    ) -> Self {
        Self {
            core: Arc::new(SocketCore {
                id: Uuid::new_v4(),
                url,
                protocol,
                flavor,
                ready_state: Mutex::new(ReadyState::Connecting),
                binary_type: Mutex::new(BinaryType::default()),
                dispatcher: EventDispatcher::new(),
                registry: registry.downgrade(),
                attached_to: Mutex::new(None),
            }),
        }
    }

    /// Unique socket id
    pub fn id(&self) -> Uuid {
        self.core.id
    }

    /// Normalized URL the socket connected to
    pub fn url(&self) -> &str {
        &self.core.url
    }

    /// Negotiated sub-protocol ("" if none)
    pub fn protocol(&self) -> &str {
        &self.core.protocol
    }

    /// Client API this socket imitates
    pub fn flavor(&self) -> Flavor {
        self.core.flavor
    }

    /// Current lifecycle state
    pub fn ready_state(&self) -> ReadyState {
        *lock(&self.core.ready_state)
    }

    pub(crate) fn set_ready_state(&self, state: ReadyState) {
        *lock(&self.core.ready_state) = state;
    }

    /// Binary payload representation
    pub fn binary_type(&self) -> BinaryType {
        *lock(&self.core.binary_type)
    }

    /// Change the binary payload representation
    pub fn set_binary_type(&self, binary_type: BinaryType) {
        *lock(&self.core.binary_type) = binary_type;
    }

    /// The registry, unless it has been dropped
    pub(crate) fn registry(&self) -> Option<ConnectionRegistry> {
        self.core.registry.upgrade()
    }

    /// Entry URL the socket is attached under
    pub(crate) fn attached_to(&self) -> Option<String> {
        lock(&self.core.attached_to).clone()
    }

    pub(crate) fn set_attached_to(&self, url: Option<String>) {
        *lock(&self.core.attached_to) = url;
    }

    pub(crate) fn downgrade(&self) -> WeakClient {
        WeakClient(Arc::downgrade(&self.core))
    }

    pub(crate) fn target(&self) -> EventTarget {
        EventTarget::Client(self.clone())
    }

    /// Register a listener on this socket
    pub fn on(&self, event_type: &str, listener: Listener) {
        self.core.dispatcher.on(event_type, listener);
    }

    /// Remove a listener from this socket
    pub fn off(&self, event_type: &str, listener: &Listener) {
        self.core.dispatcher.off(event_type, listener);
    }

    /// Whether anything listens for `event_type` on this socket
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.core.dispatcher.has_listeners(event_type)
    }

    /// Deliver an event to this socket's listeners
    ///
    /// WebSocket clients follow the dispatcher convention (event, or extra
    /// args when present). Socket.IO clients additionally unwrap message
    /// events to their payload.
    pub(crate) fn deliver(&self, event: Event, extra_args: Vec<Value>) -> bool {
        match self.core.flavor {
            Flavor::WebSocket => self.core.dispatcher.dispatch(event, extra_args),
            Flavor::SocketIo => {
                let event_type = event.event_type.clone();
                let delivery = if !extra_args.is_empty() {
                    Delivery::Args(extra_args)
                } else if let Some(data) = event.data() {
                    Delivery::Args(vec![data.clone()])
                } else {
                    Delivery::Event(event)
                };
                self.core.dispatcher.dispatch_delivery(&event_type, delivery)
            }
        }
    }

    /// Mark the socket closed and surface a transport failure as events
    pub(crate) fn fail_connection(&self, code: u16) {
        self.set_ready_state(ReadyState::Closed);
        self.deliver(Event::new("error").with_target(self.target()), Vec::new());
        self.deliver(
            Event::close("close", code, "").with_target(self.target()),
            Vec::new(),
        );
    }

    /// Client-initiated close shared by both flavours
    ///
    /// No-op unless open. The close event is delivered to the socket and,
    /// retyped as `server_event`, to the server it was attached to.
    pub(crate) fn close_from_client(&self, code: u16, reason: &str, server_event: &str) {
        if self.ready_state() != ReadyState::Open {
            return;
        }

        let server = self.registry().and_then(|registry| {
            let server = registry.server_of(self);
            registry.detach_socket(self);
            server
        });
        let event = Event::close("close", code, reason).with_target(self.target());

        self.set_ready_state(ReadyState::Closed);
        self.deliver(event.clone(), Vec::new());

        if let Some(server) = server {
            server.dispatcher().dispatch(event.retyped(server_event), Vec::new());
        }

        tracing::debug!(socket_id = %self.id(), url = %self.url(), code, "Client closed connection");
    }

    /// Push a message from the server side to this client
    ///
    /// Returns false (and delivers nothing) unless the client is open.
    pub fn send(&self, data: impl Into<Value>) -> bool {
        if self.ready_state() != ReadyState::Open {
            return false;
        }
        let event = Event::message("message", data.into(), self.url()).with_target(self.target());
        self.deliver(event, Vec::new());
        true
    }

    /// Add this client to a room on its server
    pub fn join(&self, room: &str) {
        if let Some(registry) = self.registry() {
            registry.join_room(self, room);
        }
    }

    /// Remove this client from a room
    pub fn leave(&self, room: &str) {
        if let Some(registry) = self.registry() {
            registry.leave_room(self, room);
        }
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for ClientHandle {}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.core.id)
            .field("url", &self.core.url)
            .field("flavor", &self.core.flavor)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{close_code, listener};
    use serde_json::json;

    fn handle(flavor: Flavor) -> ClientHandle {
        let registry = ConnectionRegistry::new();
        ClientHandle::new(&registry, "ws://localhost/".to_string(), String::new(), flavor)
    }

    #[test]
    fn test_identity_equality() {
        let a = handle(Flavor::WebSocket);
        let b = handle(Flavor::WebSocket);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_ready_state_serialization() {
        assert_eq!(serde_json::to_string(&ReadyState::Open).unwrap(), "\"OPEN\"");
        assert_eq!(ReadyState::Closed as u8, 3);
    }

    #[test]
    fn test_websocket_flavor_passes_event() {
        let socket = handle(Flavor::WebSocket);
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        socket.on(
            "message",
            listener(move |d| *s.lock().unwrap() = d.event().map(|e| e.event_type.clone())),
        );

        socket.deliver(Event::message("message", json!("hi"), "ws://localhost/"), Vec::new());
        assert_eq!(seen.lock().unwrap().as_deref(), Some("message"));
    }

    #[test]
    fn test_socket_io_flavor_unwraps_payload() {
        let socket = handle(Flavor::SocketIo);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        socket.on(
            "chat",
            listener(move |d| s.lock().unwrap().push(d.args().to_vec())),
        );

        socket.deliver(Event::message("chat", json!("hi"), "ws://localhost/"), Vec::new());
        socket.deliver(Event::message("chat", json!([1, 2]), "ws://localhost/"), vec![json!(1), json!(2)]);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![vec![json!("hi")], vec![json!(1), json!(2)]]
        );
    }

    #[test]
    fn test_fail_connection_sequence() {
        let socket = handle(Flavor::WebSocket);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in ["error", "close"] {
            let s = Arc::clone(&seen);
            socket.on(
                kind,
                listener(move |d| {
                    let event = d.event().unwrap();
                    s.lock().unwrap().push((event.event_type.clone(), event.code()));
                }),
            );
        }

        socket.fail_connection(close_code::NORMAL);

        assert_eq!(socket.ready_state(), ReadyState::Closed);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("error".to_string(), None), ("close".to_string(), Some(1000))]
        );
    }

    #[test]
    fn test_send_requires_open() {
        let socket = handle(Flavor::WebSocket);
        assert!(!socket.send("too early"));
        socket.set_ready_state(ReadyState::Open);
        assert!(socket.send("hello"));
    }
}
