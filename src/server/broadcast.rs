//! Broadcast targets
//!
//! Narrowed views of a server's sockets, built with `to()` / `broadcast()`.

use serde_json::Value;

use super::endpoint::{EmitOptions, Server};
use crate::socket::ClientHandle;

/// Emits to the members of one or more rooms
#[derive(Debug, Clone)]
pub struct RoomBroadcaster {
    server: Server,
    excluding: Option<ClientHandle>,
    sockets: Vec<ClientHandle>,
}

impl RoomBroadcaster {
    /// `accumulated` plus the members of `room`, without duplicates and
    /// without `excluding`
    pub(crate) fn new(
        server: Server,
        room: &str,
        excluding: Option<ClientHandle>,
        accumulated: Vec<ClientHandle>,
    ) -> Self {
        let members = server.sockets(Some(room), excluding.as_ref());

        let mut sockets = accumulated;
        for member in members {
            if !sockets.contains(&member) {
                sockets.push(member);
            }
        }

        Self {
            server,
            excluding,
            sockets,
        }
    }

    /// Add another room's members
    pub fn to(self, room: &str) -> Self {
        Self::new(self.server, room, self.excluding, self.sockets)
    }

    /// Alias for [`RoomBroadcaster::to`]
    pub fn in_room(self, room: &str) -> Self {
        self.to(room)
    }

    /// Sockets this broadcaster will reach
    pub fn sockets(&self) -> &[ClientHandle] {
        &self.sockets
    }

    /// Emit to every collected socket
    pub fn emit(&self, event_type: &str, data: impl Into<Value>) {
        self.server.emit(
            event_type,
            data,
            EmitOptions::websockets(self.sockets.clone()),
        );
    }
}

/// Emits to every socket at the server's URL except the originating client
#[derive(Debug, Clone)]
pub struct ClientBroadcast {
    server: Server,
    client: ClientHandle,
}

impl ClientBroadcast {
    pub(crate) fn new(server: Server, client: ClientHandle) -> Self {
        Self { server, client }
    }

    /// Emit to every other socket on the server
    pub fn emit(&self, event_type: &str, data: impl Into<Value>) {
        let others = self.server.sockets(None, Some(&self.client));
        self.server
            .emit(event_type, data, EmitOptions::websockets(others));
    }

    /// Narrow to a room, still excluding the originating client
    pub fn to(&self, room: &str) -> RoomBroadcaster {
        self.server.to_excluding(room, &self.client)
    }

    /// Alias for [`ClientBroadcast::to`]
    pub fn in_room(&self, room: &str) -> RoomBroadcaster {
        self.to(room)
    }
}
