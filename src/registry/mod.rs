//! Connection Registry
//!
//! Shared state behind every simulated socket.
//!
//! ## Architecture
//!
//! - **ConnectionRegistry**: URL → server, attached sockets and rooms
//! - **Scheduler**: FIFO queue of delayed jobs (connection setup, `send`)
//! - **WebSocketBinding**: the ambient constructor slot servers install into
//! - **normalize_url**: key normalization used by every lookup
//!
//! Each test builds its own registry, so tests never share sockets.

mod binding;
mod connections;
mod normalize;
mod scheduler;

pub use binding::{ConnectFn, PreviousBinding, WebSocketBinding};
pub use connections::ConnectionRegistry;
pub(crate) use connections::WeakRegistry;
pub use normalize::normalize_url;
