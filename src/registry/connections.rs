//! Connection Registry
//!
//! Directory of simulated endpoints: URL → server, its attached client
//! sockets, and named rooms. One registry is shared (by cloning) between all
//! servers and clients of a test; separate registries never see each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use super::binding::{PreviousBinding, WebSocketBinding};
use super::scheduler::Scheduler;
use crate::config::SimulatorConfig;
use crate::error::{SocketError, SocketResult};
use crate::server::Server;
use crate::socket::{ClientHandle, WebSocket};
use crate::sync::lock;

/// Everything bound to one URL
struct ConnectionEntry {
    url: String,
    server: Server,
    /// Attached sockets, in attach order, each at most once
    sockets: Vec<ClientHandle>,
    /// Room name → members (always a subset of `sockets`)
    rooms: HashMap<String, Vec<ClientHandle>>,
}

struct RegistryInner {
    /// Entries in bind order; prefix lookups scan in this order
    entries: Mutex<Vec<ConnectionEntry>>,
    binding: Mutex<Option<WebSocketBinding>>,
    scheduler: Scheduler,
    config: SimulatorConfig,
}

/// Shared directory of simulated servers and sockets
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

/// Non-owning registry reference held by servers and sockets
///
/// The registry owns its servers and sockets; they only point back weakly,
/// so dropping the last `ConnectionRegistry` frees everything even if no
/// server was stopped.
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<ConnectionRegistry> {
        self.0.upgrade().map(|inner| ConnectionRegistry { inner })
    }
}

/// Index of the entry serving `url`: exact match first, otherwise the first
/// bound URL that is a prefix of it.
fn resolve(entries: &[ConnectionEntry], url: &str) -> Option<usize> {
    entries
        .iter()
        .position(|e| e.url == url)
        .or_else(|| entries.iter().position(|e| url.starts_with(e.url.as_str())))
}

impl ConnectionRegistry {
    /// Create a registry with default settings
    pub fn new() -> Self {
        Self::with_config(SimulatorConfig::default())
    }

    /// Create a registry with custom settings
    pub fn with_config(config: SimulatorConfig) -> Self {
        let scheduler = Scheduler::new(Duration::from_millis(config.delivery_delay_ms));
        Self {
            inner: Arc::new(RegistryInner {
                entries: Mutex::new(Vec::new()),
                binding: Mutex::new(None),
                scheduler,
                config,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.inner))
    }

    /// Simulator settings this registry was built with
    pub fn config(&self) -> &SimulatorConfig {
        &self.inner.config
    }

    /// Delay applied to deferred deliveries
    pub fn delivery_delay(&self) -> Duration {
        self.inner.scheduler.delay()
    }

    /// Bind a server to `url`
    ///
    /// Returns the server on success, `None` if the URL is already bound.
    pub fn bind_server(&self, url: &str, server: Server) -> Option<Server> {
        let mut entries = lock(&self.inner.entries);
        if entries.iter().any(|e| e.url == url) {
            tracing::debug!(url = %url, "Bind rejected: address in use");
            return None;
        }

        entries.push(ConnectionEntry {
            url: url.to_string(),
            server: server.clone(),
            sockets: Vec::new(),
            rooms: HashMap::new(),
        });

        tracing::debug!(url = %url, "Server bound");
        Some(server)
    }

    /// Remove the entry for `url` together with its sockets and rooms
    ///
    /// Sockets are not notified; callers close them first if needed.
    pub fn unbind_server(&self, url: &str) {
        let mut entries = lock(&self.inner.entries);
        let Some(index) = entries.iter().position(|e| e.url == url) else {
            return;
        };
        let entry = entries.remove(index);
        drop(entries);

        for socket in &entry.sockets {
            socket.set_attached_to(None);
        }
        tracing::debug!(url = %url, "Server unbound");
    }

    /// Attach a client socket to the server listening on `url`
    ///
    /// Returns the server, or `None` if nobody listens there or the socket
    /// is already attached.
    pub fn attach_socket(&self, url: &str, socket: &ClientHandle) -> Option<Server> {
        let mut entries = lock(&self.inner.entries);
        let index = resolve(&entries, url)?;
        let entry = &mut entries[index];

        if entry.sockets.contains(socket) {
            return None;
        }
        entry.sockets.push(socket.clone());
        socket.set_attached_to(Some(entry.url.clone()));

        tracing::debug!(
            url = %url,
            server_url = %entry.url,
            socket_id = %socket.id(),
            "Socket attached"
        );
        Some(entry.server.clone())
    }

    /// Detach a socket from the entry it attached to, dropping all of its
    /// room memberships
    pub fn detach_socket(&self, socket: &ClientHandle) {
        let Some(url) = socket.attached_to() else {
            return;
        };
        let mut entries = lock(&self.inner.entries);
        let Some(entry) = entries.iter_mut().find(|e| e.url == url) else {
            return;
        };

        let before = entry.sockets.len();
        entry.sockets.retain(|s| s != socket);
        for members in entry.rooms.values_mut() {
            members.retain(|s| s != socket);
        }
        entry.rooms.retain(|_, members| !members.is_empty());
        let detached = entry.sockets.len() != before;
        drop(entries);

        if detached {
            socket.set_attached_to(None);
            tracing::debug!(url = %url, socket_id = %socket.id(), "Socket detached");
        }
    }

    /// Entry a socket is currently attached to
    fn attached_entry<'a>(
        entries: &'a mut [ConnectionEntry],
        socket: &ClientHandle,
    ) -> Option<&'a mut ConnectionEntry> {
        let url = socket.attached_to()?;
        entries
            .iter_mut()
            .find(|e| e.url == url && e.sockets.contains(socket))
    }

    /// Server the socket is attached to, if it is still attached
    pub fn server_of(&self, socket: &ClientHandle) -> Option<Server> {
        let mut entries = lock(&self.inner.entries);
        Self::attached_entry(&mut entries, socket).map(|e| e.server.clone())
    }

    /// Add a socket to a room on its server
    ///
    /// No-op if the socket is not attached. Joining twice keeps a single
    /// membership.
    pub fn join_room(&self, socket: &ClientHandle, room: &str) {
        let mut entries = lock(&self.inner.entries);
        let Some(entry) = Self::attached_entry(&mut entries, socket) else {
            tracing::warn!(socket_id = %socket.id(), room = %room, "Join ignored: socket not attached");
            return;
        };

        let members = entry.rooms.entry(room.to_string()).or_default();
        if !members.contains(socket) {
            members.push(socket.clone());
        }

        tracing::debug!(socket_id = %socket.id(), room = %room, "Joined room");
    }

    /// Remove a socket from a room
    pub fn leave_room(&self, socket: &ClientHandle, room: &str) {
        let mut entries = lock(&self.inner.entries);
        let Some(entry) = Self::attached_entry(&mut entries, socket) else {
            return;
        };

        if let Some(members) = entry.rooms.get_mut(room) {
            members.retain(|s| s != socket);
            if members.is_empty() {
                entry.rooms.remove(room);
            }
        }

        tracing::debug!(socket_id = %socket.id(), room = %room, "Left room");
    }

    /// Sockets at `url`, optionally restricted to a room and minus one socket
    ///
    /// With a room, only that room's members are returned (empty if the
    /// room does not exist).
    pub fn lookup_sockets(
        &self,
        url: &str,
        room: Option<&str>,
        excluding: Option<&ClientHandle>,
    ) -> Vec<ClientHandle> {
        let entries = lock(&self.inner.entries);
        let Some(index) = resolve(&entries, url) else {
            return Vec::new();
        };
        let entry = &entries[index];

        let sockets = match room {
            Some(room) => entry.rooms.get(room).map(Vec::as_slice).unwrap_or(&[]),
            None => entry.sockets.as_slice(),
        };

        sockets
            .iter()
            .filter(|s| excluding != Some(*s))
            .cloned()
            .collect()
    }

    /// Server listening on `url` (exact or prefix match)
    pub fn lookup_server(&self, url: &str) -> Option<Server> {
        let entries = lock(&self.inner.entries);
        resolve(&entries, url).map(|i| entries[i].server.clone())
    }

    /// URLs that currently have a server bound, in bind order
    pub fn servers(&self) -> Vec<String> {
        lock(&self.inner.entries)
            .iter()
            .map(|e| e.url.clone())
            .collect()
    }

    /// Number of sockets attached at `url`
    pub fn socket_count(&self, url: &str) -> usize {
        let entries = lock(&self.inner.entries);
        resolve(&entries, url)
            .map(|i| entries[i].sockets.len())
            .unwrap_or(0)
    }

    /// Install a binding in the ambient slot, returning the previous one
    pub fn install_binding(&self, binding: WebSocketBinding) -> PreviousBinding {
        let mut slot = lock(&self.inner.binding);
        tracing::debug!(binding = %binding.name(), "Installed WebSocket binding");
        PreviousBinding(slot.replace(binding))
    }

    /// Put back the binding that was active before the matching install
    pub fn uninstall_binding(&self, previous: PreviousBinding) {
        let mut slot = lock(&self.inner.binding);
        match &previous.0 {
            Some(binding) => tracing::debug!(binding = %binding.name(), "Restored WebSocket binding"),
            None => tracing::debug!("Removed WebSocket binding"),
        }
        *slot = previous.0;
    }

    /// Binding currently installed, if any
    pub fn binding(&self) -> Option<WebSocketBinding> {
        lock(&self.inner.binding).clone()
    }

    /// Open a WebSocket through whatever binding is installed
    pub fn connect_ambient(&self, url: &str) -> SocketResult<WebSocket> {
        match self.binding() {
            Some(WebSocketBinding::Mock) => WebSocket::new(self, url),
            Some(WebSocketBinding::Custom { connect, .. }) => connect(self, url),
            None => Err(SocketError::NoBinding),
        }
    }

    /// Schedule a job after the delivery delay
    pub fn defer<F>(&self, run: F) -> SocketResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.scheduler.defer(run)
    }

    /// Wait until every deferred job scheduled so far has run
    pub async fn settle(&self) {
        self.inner.scheduler.settle().await;
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("servers", &self.servers())
            .field("config", &self.inner.config)
            .finish()
    }
}
