//! # mocksocket
//!
//! In-process WebSocket and Socket.IO mock for testing real-time clients
//! without a network.
//!
//! ## Features
//!
//! - **Mock server**: bind to a URL, accept or reject clients, broadcast
//! - **Browser-style WebSocket**: `open`/`message`/`close`/`error` with
//!   asynchronous-looking delivery
//! - **Socket.IO client**: `emit` with positional arguments, rooms, broadcast
//! - **Isolation**: every test owns its [`ConnectionRegistry`]
//!
//! ## Modules
//!
//! - [`event`]: event objects and the listener dispatcher
//! - [`registry`]: URL → server/sockets/rooms directory and delivery scheduler
//! - [`socket`]: WebSocket and Socket.IO clients
//! - [`server`]: the mock server and broadcast targets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mocksocket::{listener, ConnectionRegistry, EmitOptions, Server, SocketIoClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ConnectionRegistry::new();
//!     let server = Server::new(&registry, "http://localhost:3000")?;
//!
//!     let client = SocketIoClient::new(&registry, "http://localhost:3000")?;
//!     client.on("greeting", listener(|d| println!("got {:?}", d.args())));
//!
//!     // Let the handshake complete
//!     registry.settle().await;
//!
//!     server.emit("greeting", "hello", EmitOptions::default());
//!     server.stop();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod registry;
pub mod server;
pub mod socket;

mod sync;

// Re-export top-level types for convenience
pub use error::{SocketError, SocketResult};

pub use event::{close_code, listener, Delivery, Event, EventDetail, EventDispatcher, EventTarget, Listener};

pub use registry::{normalize_url, ConnectFn, ConnectionRegistry, PreviousBinding, WebSocketBinding};

pub use socket::{io, BinaryType, ClientHandle, Flavor, ReadyState, SocketIoClient, WebSocket};

pub use server::{
    ClientBroadcast, CloseOptions, EmitOptions, RoomBroadcaster, Server, ServerOptions,
    SimulatedEvent, VerifyClient,
};

pub use config::{Config, ConfigError, LoggingConfig, SimulatorConfig};
