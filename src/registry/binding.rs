//! Ambient WebSocket binding
//!
//! Application code under test opens sockets through
//! [`ConnectionRegistry::connect_ambient`](super::ConnectionRegistry::connect_ambient)
//! instead of naming a concrete constructor. Binding a server installs the
//! mock into that slot; stopping it puts back whatever was there before.

use std::fmt;
use std::sync::Arc;

use super::ConnectionRegistry;
use crate::error::SocketResult;
use crate::socket::WebSocket;

/// Constructor used by a custom binding
pub type ConnectFn = Arc<dyn Fn(&ConnectionRegistry, &str) -> SocketResult<WebSocket> + Send + Sync>;

/// What `connect_ambient` constructs
#[derive(Clone)]
pub enum WebSocketBinding {
    /// The in-memory mock WebSocket
    Mock,
    /// Any other constructor the test harness installed
    Custom {
        /// Label used in logs
        name: String,
        /// Constructor
        connect: ConnectFn,
    },
}

impl WebSocketBinding {
    /// Label used in logs
    pub fn name(&self) -> &str {
        match self {
            WebSocketBinding::Mock => "mock",
            WebSocketBinding::Custom { name, .. } => name,
        }
    }
}

impl fmt::Debug for WebSocketBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WebSocketBinding({})", self.name())
    }
}

/// Restore token returned when a binding is installed
#[must_use = "the previous binding is lost unless the token is handed back to uninstall_binding"]
#[derive(Debug)]
pub struct PreviousBinding(pub(crate) Option<WebSocketBinding>);

impl PreviousBinding {
    /// The binding that was replaced, if any
    pub fn binding(&self) -> Option<&WebSocketBinding> {
        self.0.as_ref()
    }
}
