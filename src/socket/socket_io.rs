//! Socket.IO client
//!
//! Same lifecycle as the WebSocket client, with the Socket.IO vocabulary:
//! `connect`/`disconnect` instead of `open`/`close`, synchronous `emit` with
//! positional arguments, rooms, and broadcast to every other client.

use serde_json::Value;

use super::handle::{ClientHandle, Flavor, ReadyState};
use crate::error::{SocketError, SocketResult};
use crate::event::{close_code, listener, Event, Listener};
use crate::registry::{normalize_url, ConnectionRegistry};
use crate::server::{ClientBroadcast, RoomBroadcaster, Server};

/// Simulated Socket.IO client
#[derive(Debug, Clone)]
pub struct SocketIoClient {
    handle: ClientHandle,
}

/// Connect a Socket.IO client, falling back to the configured default URL
pub fn io(registry: &ConnectionRegistry, url: Option<&str>) -> SocketResult<SocketIoClient> {
    match url {
        Some(url) => SocketIoClient::new(registry, url),
        None => {
            let default_url = registry.config().default_socket_io_url.clone();
            SocketIoClient::new(registry, &default_url)
        }
    }
}

impl SocketIoClient {
    /// Connect to `url`
    pub fn new(registry: &ConnectionRegistry, url: &str) -> SocketResult<Self> {
        Self::with_protocol(registry, url, "")
    }

    /// Alias for [`SocketIoClient::new`]
    pub fn connect(registry: &ConnectionRegistry, url: &str) -> SocketResult<Self> {
        Self::new(registry, url)
    }

    /// Connect to `url` reporting the given protocol
    pub fn with_protocol(
        registry: &ConnectionRegistry,
        url: &str,
        protocol: &str,
    ) -> SocketResult<Self> {
        if url.is_empty() {
            return Err(SocketError::Construction {
                kind: "SocketIO",
                reason: "a URL is required".to_string(),
            });
        }
        let parsed = normalize_url(url).map_err(|e| SocketError::Construction {
            kind: "SocketIO",
            reason: format!("The URL '{}' is invalid: {}", url, e),
        })?;

        let handle = ClientHandle::new(registry, parsed.to_string(), protocol.to_string(), Flavor::SocketIo);
        let server = registry.attach_socket(handle.url(), &handle);

        let socket = handle.clone();
        if let Err(e) = registry.defer(move || establish(socket, server)) {
            registry.detach_socket(&handle);
            return Err(e);
        }

        // Socket.IO surfaces every close as `disconnect`
        let weak = handle.downgrade();
        handle.on(
            "close",
            listener(move |delivery| {
                let (Some(socket), Some(event)) = (weak.upgrade(), delivery.event()) else {
                    return;
                };
                socket.deliver(event.retyped("disconnect"), Vec::new());
            }),
        );

        tracing::debug!(socket_id = %handle.id(), url = %handle.url(), "Socket.IO connecting");
        Ok(Self { handle })
    }

    /// Shared handle (what servers and rooms see)
    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }

    /// Unique socket id
    pub fn id(&self) -> uuid::Uuid {
        self.handle.id()
    }

    /// Normalized URL
    pub fn url(&self) -> &str {
        self.handle.url()
    }

    /// Reported protocol ("" if none)
    pub fn protocol(&self) -> &str {
        self.handle.protocol()
    }

    /// Current lifecycle state
    pub fn ready_state(&self) -> ReadyState {
        self.handle.ready_state()
    }

    /// Whether the connection is open
    pub fn connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Whether the connection is closed
    pub fn disconnected(&self) -> bool {
        self.ready_state() == ReadyState::Closed
    }

    /// Register a listener
    ///
    /// Message payloads arrive unwrapped as
    /// [`Delivery::Args`](crate::event::Delivery::Args).
    pub fn on(&self, event_type: &str, listener: Listener) -> &Self {
        self.handle.on(event_type, listener);
        self
    }

    /// Remove a listener
    pub fn off(&self, event_type: &str, listener: &Listener) -> &Self {
        self.handle.off(event_type, listener);
        self
    }

    /// Whether any listener is registered for `event_type`
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.handle.has_listeners(event_type)
    }

    /// Emit an event to the server with positional arguments
    pub fn emit(&self, event_type: &str, args: Vec<Value>) -> SocketResult<&Self> {
        if self.ready_state() != ReadyState::Open {
            return Err(SocketError::InvalidState(
                "SocketIO is not connected".to_string(),
            ));
        }

        match self.handle.registry().and_then(|r| r.server_of(&self.handle)) {
            Some(server) => {
                let event = Event::message(event_type, Value::Array(args.clone()), self.url())
                    .with_target(self.handle.target());
                server.dispatcher().dispatch(event, args);
            }
            None => {
                tracing::debug!(socket_id = %self.id(), event = %event_type, "Emit dropped: no server");
            }
        }
        Ok(self)
    }

    /// Emit a `message` event with a single payload
    pub fn send(&self, data: impl Into<Value>) -> SocketResult<&Self> {
        self.emit("message", vec![data.into()])
    }

    /// Broadcast target covering every other client at this URL
    pub fn broadcast(&self) -> SocketResult<ClientBroadcast> {
        if self.ready_state() != ReadyState::Open {
            return Err(SocketError::InvalidState("SocketIO is not connected".to_string()));
        }
        let server = self
            .handle
            .registry()
            .and_then(|registry| registry.server_of(&self.handle))
            .ok_or_else(|| SocketError::NoServer(self.url().to_string()))?;

        Ok(ClientBroadcast::new(server, self.handle.clone()))
    }

    /// Broadcast to a room, excluding this client
    pub fn to(&self, room: &str) -> SocketResult<RoomBroadcaster> {
        Ok(self.broadcast()?.to(room))
    }

    /// Alias for [`SocketIoClient::to`]
    pub fn in_room(&self, room: &str) -> SocketResult<RoomBroadcaster> {
        self.to(room)
    }

    /// Join a room on the server
    pub fn join(&self, room: &str) {
        self.handle.join(room);
    }

    /// Leave a room
    pub fn leave(&self, room: &str) {
        self.handle.leave(room);
    }

    /// Close the connection; the server sees `disconnect`
    pub fn close(&self) -> &Self {
        self.handle.close_from_client(close_code::NORMAL, "", "disconnect");
        self
    }

    /// Alias for [`SocketIoClient::close`]
    pub fn disconnect(&self) -> &Self {
        self.close()
    }
}

fn establish(socket: ClientHandle, server: Option<Server>) {
    match server {
        Some(server) => {
            socket.set_ready_state(ReadyState::Open);
            server.announce("connection", &socket);
            server.announce("connect", &socket);
            socket.deliver(Event::new("connect").with_target(socket.target()), Vec::new());
            tracing::debug!(socket_id = %socket.id(), url = %socket.url(), "Socket.IO connected");
        }
        None => {
            socket.fail_connection(close_code::NORMAL);
            tracing::error!(url = %socket.url(), "Socket.io connection to '{}' failed", socket.url());
        }
    }
}
