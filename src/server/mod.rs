//! Simulated Server
//!
//! - **Server**: listening endpoint with broadcast and rooms
//! - **RoomBroadcaster** / **ClientBroadcast**: narrowed emit targets

mod broadcast;
mod endpoint;

pub use broadcast::{ClientBroadcast, RoomBroadcaster};
pub use endpoint::{CloseOptions, EmitOptions, Server, ServerOptions, SimulatedEvent, VerifyClient};
