//! Events and Dispatch
//!
//! - **Event**: the record handed to listeners (generic, message, close)
//! - **EventDispatcher**: per-object listener registry
//! - **close_code**: WebSocket close status codes

pub mod close_code;
mod dispatcher;
mod types;

pub use dispatcher::{listener, Delivery, EventDispatcher, Listener};
pub use types::{Event, EventDetail, EventTarget};
