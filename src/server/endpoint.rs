//! Mock server
//!
//! Listens on a URL in a [`ConnectionRegistry`], accepts clients, and fans
//! events out to every attached socket, an explicit list, or a room.

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::broadcast::RoomBroadcaster;
use crate::error::{SocketError, SocketResult};
use crate::event::{close_code, Delivery, Event, EventDispatcher, EventTarget, Listener};
use crate::registry::{
    normalize_url, ConnectionRegistry, PreviousBinding, WeakRegistry, WebSocketBinding,
};
use crate::socket::{ClientHandle, ReadyState};
use crate::sync::lock;

/// Handshake check; returning false rejects the connecting client
pub type VerifyClient = Arc<dyn Fn() -> bool + Send + Sync>;

/// Server construction options
#[derive(Clone, Default)]
pub struct ServerOptions {
    /// Called for each connecting WebSocket client
    pub verify_client: Option<VerifyClient>,
}

impl ServerOptions {
    /// Set the handshake check
    pub fn verify_client<F>(mut self, verify: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.verify_client = Some(Arc::new(verify));
        self
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("verify_client", &self.verify_client.is_some())
            .finish()
    }
}

/// Options for [`Server::emit`]
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Deliver only to these sockets instead of every attached socket
    pub websockets: Option<Vec<ClientHandle>>,
}

impl EmitOptions {
    /// Target an explicit socket list
    pub fn websockets(sockets: Vec<ClientHandle>) -> Self {
        Self {
            websockets: Some(sockets),
        }
    }
}

/// Options for [`Server::close`]
#[derive(Debug, Clone, Default)]
pub struct CloseOptions {
    /// Close code sent to clients (default: 1000)
    pub code: Option<u16>,
    /// Close reason sent to clients (default: "")
    pub reason: Option<String>,
    /// Force the clean-close flag
    pub was_clean: bool,
}

/// Failures a test can inject with [`Server::simulate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatedEvent {
    /// Transport error: every client errors out and closes abnormally
    Error,
}

struct ServerInner {
    url: String,
    options: ServerOptions,
    registry: WeakRegistry,
    dispatcher: EventDispatcher,
    /// Restore token while this server's binding is installed
    previous_binding: Mutex<Option<PreviousBinding>>,
}

/// Simulated WebSocket / Socket.IO server
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// Listen on `url`
    pub fn new(registry: &ConnectionRegistry, url: &str) -> SocketResult<Self> {
        Self::with_options(registry, url, ServerOptions::default())
    }

    /// Namespace alias for [`Server::new`]
    pub fn of(registry: &ConnectionRegistry, url: &str) -> SocketResult<Self> {
        Self::new(registry, url)
    }

    /// Listen on `url` with options
    ///
    /// The server keeps only a weak reference to `registry`; once the last
    /// registry handle is dropped the server stops seeing clients.
    ///
    /// Fails with [`SocketError::AddressInUse`] if another server is bound to
    /// the same URL (after dispatching `error` on the new server). On success
    /// the mock is installed as the registry's ambient WebSocket binding.
    pub fn with_options(
        registry: &ConnectionRegistry,
        url: &str,
        options: ServerOptions,
    ) -> SocketResult<Self> {
        if url.is_empty() {
            return Err(SocketError::Construction {
                kind: "Server",
                reason: "a URL is required".to_string(),
            });
        }
        let url = normalize_url(url)
            .map_err(|e| SocketError::Construction {
                kind: "Server",
                reason: format!("The URL '{}' is invalid: {}", url, e),
            })?
            .to_string();

        let server = Self {
            inner: Arc::new(ServerInner {
                url: url.clone(),
                options,
                registry: registry.downgrade(),
                dispatcher: EventDispatcher::new(),
                previous_binding: Mutex::new(None),
            }),
        };

        if registry.bind_server(&url, server.clone()).is_none() {
            server.inner.dispatcher.dispatch(
                Event::new("error").with_target(EventTarget::Server(server.clone())),
                Vec::new(),
            );
            tracing::error!(url = %url, "A mock server is already listening on this url");
            return Err(SocketError::AddressInUse(url));
        }

        let previous = registry.install_binding(WebSocketBinding::Mock);
        *lock(&server.inner.previous_binding) = Some(previous);

        tracing::info!(url = %url, "Mock server listening");
        Ok(server)
    }

    /// Normalized URL the server is bound to
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Options the server was created with
    pub fn options(&self) -> &ServerOptions {
        &self.inner.options
    }

    /// Whether both values refer to the same server
    pub fn ptr_eq(&self, other: &Server) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The registry, unless it has been dropped
    pub(crate) fn registry(&self) -> Option<ConnectionRegistry> {
        self.inner.registry.upgrade()
    }

    pub(crate) fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    /// Register a listener (`connection`, `message`, `close`, custom events)
    pub fn on(&self, event_type: &str, listener: Listener) {
        self.inner.dispatcher.on(event_type, listener);
    }

    /// Remove a listener
    pub fn off(&self, event_type: &str, listener: &Listener) {
        self.inner.dispatcher.off(event_type, listener);
    }

    /// Whether anything listens for `event_type` on this server
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.inner.dispatcher.has_listeners(event_type)
    }

    /// Run the handshake check
    pub(crate) fn accepts_client(&self) -> bool {
        self.inner
            .options
            .verify_client
            .as_ref()
            .map_or(true, |verify| verify())
    }

    /// Tell `event_type` listeners about a newly connected client
    pub(crate) fn announce(&self, event_type: &str, client: &ClientHandle) {
        self.inner
            .dispatcher
            .dispatch_delivery(event_type, Delivery::Connection(client.clone()));
    }

    /// The registry while this server is still the one bound to its URL
    fn bound_registry(&self) -> Option<ConnectionRegistry> {
        self.registry().filter(|registry| {
            registry
                .lookup_server(self.url())
                .is_some_and(|bound| bound.ptr_eq(self))
        })
    }

    /// This server's sockets, optionally restricted to a room and minus one
    ///
    /// Empty once the server no longer owns its URL, even if another server
    /// has bound it since.
    pub(crate) fn sockets(
        &self,
        room: Option<&str>,
        excluding: Option<&ClientHandle>,
    ) -> Vec<ClientHandle> {
        self.bound_registry()
            .map(|registry| registry.lookup_sockets(self.url(), room, excluding))
            .unwrap_or_default()
    }

    /// Sockets currently attached to this server
    pub fn clients(&self) -> Vec<ClientHandle> {
        self.sockets(None, None)
    }

    /// Stop listening
    ///
    /// Restores the ambient binding this server replaced and releases the
    /// URL. Calling it again is a no-op.
    pub fn stop(&self) {
        self.stop_with(|| {});
    }

    /// Stop listening, then run `callback`
    pub fn stop_with<F: FnOnce()>(&self, callback: F) {
        let previous = lock(&self.inner.previous_binding).take();
        if let (Some(previous), Some(registry)) = (previous, self.registry()) {
            registry.uninstall_binding(previous);
        }
        if let Some(registry) = self.bound_registry() {
            registry.unbind_server(self.url());
            tracing::info!(url = %self.url(), "Mock server stopped");
        }
        callback();
    }

    /// Emit `event_type` with `data` to every attached socket, or to
    /// `options.websockets` when given
    ///
    /// Array data is spread into positional arguments.
    pub fn emit(&self, event_type: &str, data: impl Into<Value>, options: EmitOptions) {
        let data = data.into();
        let targets = options
            .websockets
            .unwrap_or_else(|| self.clients());
        let extra_args = match &data {
            Value::Array(items) => items.clone(),
            _ => Vec::new(),
        };

        for socket in &targets {
            let event = Event::message(event_type, data.clone(), self.url())
                .with_target(EventTarget::Client(socket.clone()));
            socket.deliver(event, extra_args.clone());
        }

        tracing::trace!(
            url = %self.url(),
            event = %event_type,
            recipients = targets.len(),
            "Emitted event"
        );
    }

    /// Emit a `message` event
    pub fn send(&self, data: impl Into<Value>, options: EmitOptions) {
        self.emit("message", data, options);
    }

    /// Close the server and every client attached to it
    ///
    /// The URL is released before any client is notified, so close handlers
    /// that reconnect immediately find nobody listening.
    pub fn close(&self, options: CloseOptions) {
        let sockets = self.clients();
        if let Some(registry) = self.bound_registry() {
            registry.unbind_server(self.url());
        }

        let code = options.code.unwrap_or(close_code::NORMAL);
        let reason = options.reason.unwrap_or_default();

        for socket in &sockets {
            socket.set_ready_state(ReadyState::Closing);
            let event = Event::close("close", code, reason.as_str())
                .with_was_clean(options.was_clean)
                .with_target(EventTarget::Client(socket.clone()));
            socket.deliver(event, Vec::new());
            socket.set_ready_state(ReadyState::Closed);
        }

        self.inner.dispatcher.dispatch(
            Event::close("close", code, reason).with_target(EventTarget::Server(self.clone())),
            Vec::new(),
        );

        tracing::info!(url = %self.url(), clients = sockets.len(), "Mock server closed");
    }

    /// Inject a failure
    pub fn simulate(&self, event: SimulatedEvent) {
        match event {
            SimulatedEvent::Error => {
                let sockets = self.clients();
                for socket in &sockets {
                    if let Some(registry) = self.registry() {
                        registry.detach_socket(socket);
                    }
                    socket.fail_connection(close_code::ABNORMAL);
                }
                self.inner.dispatcher.dispatch(
                    Event::new("error").with_target(EventTarget::Server(self.clone())),
                    Vec::new(),
                );
                tracing::warn!(url = %self.url(), clients = sockets.len(), "Simulated transport error");
            }
        }
    }

    /// Target the members of `room`
    pub fn to(&self, room: &str) -> RoomBroadcaster {
        RoomBroadcaster::new(self.clone(), room, None, Vec::new())
    }

    /// Target the members of `room` except `excluding`
    pub fn to_excluding(&self, room: &str, excluding: &ClientHandle) -> RoomBroadcaster {
        RoomBroadcaster::new(self.clone(), room, Some(excluding.clone()), Vec::new())
    }

    /// Alias for [`Server::to`]
    pub fn in_room(&self, room: &str) -> RoomBroadcaster {
        self.to(room)
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("url", &self.inner.url)
            .field("options", &self.inner.options)
            .finish()
    }
}
