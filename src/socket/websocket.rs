//! WebSocket client
//!
//! Mimics the browser `WebSocket`: the connection opens asynchronously
//! (after the delivery delay), `send` is delivered to the server
//! asynchronously, and `close` is synchronous.

use serde_json::Value;

use super::handle::{BinaryType, ClientHandle, Flavor, ReadyState};
use crate::error::{SocketError, SocketResult};
use crate::event::{close_code, Event, Listener};
use crate::registry::{normalize_url, ConnectionRegistry};
use crate::server::Server;

/// Simulated browser WebSocket
#[derive(Debug, Clone)]
pub struct WebSocket {
    handle: ClientHandle,
}

fn construction_error(reason: impl Into<String>) -> SocketError {
    SocketError::Construction {
        kind: "WebSocket",
        reason: reason.into(),
    }
}

impl WebSocket {
    /// Connect to `url` without a sub-protocol
    pub fn new(registry: &ConnectionRegistry, url: &str) -> SocketResult<Self> {
        Self::with_protocols(registry, url, &[])
    }

    /// Connect to `url`, offering sub-protocols
    ///
    /// The first offered protocol is the one reported by [`WebSocket::protocol`].
    pub fn with_protocols(
        registry: &ConnectionRegistry,
        url: &str,
        protocols: &[&str],
    ) -> SocketResult<Self> {
        if url.is_empty() {
            return Err(construction_error("1 argument required, but only 0 present"));
        }

        let parsed = normalize_url(url)
            .map_err(|e| construction_error(format!("The URL '{}' is invalid: {}", url, e)))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(construction_error(format!(
                "The URL's scheme must be either 'ws' or 'wss'. '{}' is not allowed",
                parsed.scheme()
            )));
        }
        if parsed.fragment().is_some() {
            return Err(construction_error(format!(
                "The URL contains a fragment identifier ('{}')",
                parsed.fragment().unwrap_or_default()
            )));
        }
        for (i, protocol) in protocols.iter().enumerate() {
            if protocols[..i].contains(protocol) {
                return Err(construction_error(format!(
                    "The subprotocol '{}' is duplicated",
                    protocol
                )));
            }
        }

        let protocol = protocols.first().map(|p| p.to_string()).unwrap_or_default();
        let handle = ClientHandle::new(registry, parsed.to_string(), protocol, Flavor::WebSocket);
        let server = registry.attach_socket(handle.url(), &handle);

        let socket = handle.clone();
        if let Err(e) = registry.defer(move || establish(socket, server)) {
            registry.detach_socket(&handle);
            return Err(e);
        }

        tracing::debug!(socket_id = %handle.id(), url = %handle.url(), "WebSocket connecting");
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

    /// Selected sub-protocol ("" if none)
    pub fn protocol(&self) -> &str {
        self.handle.protocol()
    }

    /// Current lifecycle state
    pub fn ready_state(&self) -> ReadyState {
        self.handle.ready_state()
    }

    /// How binary payloads are exposed to listeners
    pub fn binary_type(&self) -> BinaryType {
        self.handle.binary_type()
    }

    /// Change the binary payload representation
    pub fn set_binary_type(&self, binary_type: BinaryType) {
        self.handle.set_binary_type(binary_type);
    }

    /// Register a listener for any event type
    pub fn on(&self, event_type: &str, listener: Listener) {
        self.handle.on(event_type, listener);
    }

    /// Remove a listener
    pub fn off(&self, event_type: &str, listener: &Listener) {
        self.handle.off(event_type, listener);
    }

    /// Whether any listener is registered for `event_type`
    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.handle.has_listeners(event_type)
    }

    /// Listen for `open`
    pub fn on_open(&self, listener: Listener) {
        self.on("open", listener);
    }

    /// Listen for `message`
    pub fn on_message(&self, listener: Listener) {
        self.on("message", listener);
    }

    /// Listen for `close`
    pub fn on_close(&self, listener: Listener) {
        self.on("close", listener);
    }

    /// Listen for `error`
    pub fn on_error(&self, listener: Listener) {
        self.on("error", listener);
    }

    /// Send data to the server
    ///
    /// Fails once the socket is closing or closed. Delivery happens after
    /// the registry's delivery delay; with no server listening the data is
    /// dropped silently.
    pub fn send(&self, data: impl Into<Value>) -> SocketResult<()> {
        if matches!(self.ready_state(), ReadyState::Closing | ReadyState::Closed) {
            return Err(SocketError::InvalidState(
                "WebSocket is already in CLOSING or CLOSED state".to_string(),
            ));
        }

        let data = data.into();
        let Some((registry, server)) = self
            .handle
            .registry()
            .and_then(|registry| registry.server_of(&self.handle).map(|server| (registry, server)))
        else {
            tracing::debug!(socket_id = %self.id(), url = %self.url(), "Send dropped: no server");
            return Ok(());
        };

        let event = Event::message("message", data.clone(), self.url()).with_target(self.handle.target());
        registry.defer(move || {
            server.dispatcher().dispatch(event, vec![data]);
        })
    }

    /// Close with a normal closure code
    pub fn close(&self) {
        self.handle.close_from_client(close_code::NORMAL, "", "close");
    }

    /// Close with an explicit code and reason
    ///
    /// The code must be 1000 or in 3000..=4999 and the reason at most 123
    /// UTF-8 bytes.
    pub fn close_with(&self, code: u16, reason: &str) -> SocketResult<()> {
        if !close_code::is_application_code(code) {
            return Err(SocketError::InvalidAccess(format!(
                "The code must be either 1000, or between 3000 and 4999. {} is neither",
                code
            )));
        }
        if reason.len() > close_code::MAX_REASON_BYTES {
            return Err(SocketError::Syntax(format!(
                "The message must not be greater than {} bytes",
                close_code::MAX_REASON_BYTES
            )));
        }

        self.handle.close_from_client(code, reason, "close");
        Ok(())
    }
}

/// Deferred half of construction: decide how the handshake ends
fn establish(socket: ClientHandle, server: Option<Server>) {
    match server {
        None => {
            socket.fail_connection(close_code::NORMAL);
            tracing::error!(url = %socket.url(), "WebSocket connection to '{}' failed", socket.url());
        }
        Some(server) if !server.accepts_client() => {
            if let Some(registry) = socket.registry() {
                registry.detach_socket(&socket);
            }
            socket.fail_connection(close_code::NORMAL);
            tracing::error!(
                url = %socket.url(),
                "WebSocket connection to '{}' failed: HTTP Authentication failed; no valid credentials available",
                socket.url()
            );
        }
        Some(server) => {
            socket.set_ready_state(ReadyState::Open);
            socket.deliver(Event::new("open").with_target(socket.target()), Vec::new());
            server.announce("connection", &socket);
            tracing::debug!(socket_id = %socket.id(), url = %socket.url(), "WebSocket open");
        }
    }
}
