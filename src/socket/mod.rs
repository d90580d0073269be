//! Simulated Client Sockets
//!
//! - **WebSocket**: browser-style client (`open`/`message`/`close`)
//! - **SocketIoClient**: Socket.IO-style client (`connect`/`emit`/`disconnect`, rooms)
//! - **ClientHandle**: the shared reference servers and rooms hold
//!
//! ## Example
//!
//! ```rust,no_run
//! use mocksocket::{listener, ConnectionRegistry, Server, WebSocket};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ConnectionRegistry::new();
//!     let server = Server::new(&registry, "ws://localhost:8080")?;
//!     server.on("message", listener(|d| println!("server got {:?}", d.payload())));
//!
//!     let ws = WebSocket::new(&registry, "ws://localhost:8080")?;
//!     ws.on_open(listener(|_| println!("open")));
//!
//!     registry.settle().await;
//!     ws.send("hello")?;
//!     registry.settle().await;
//!
//!     server.stop();
//!     Ok(())
//! }
//! ```

mod handle;
mod socket_io;
mod websocket;

pub use handle::{BinaryType, ClientHandle, Flavor, ReadyState};
pub use socket_io::{io, SocketIoClient};
pub use websocket::WebSocket;
