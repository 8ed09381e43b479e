//! WebSocket infrastructure for the `/collab` channel.
//!
//! Provides the room hub, heartbeat, and the HTTP upgrade handler.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::{collab_handler, CollabQuery};
pub use heartbeat::start_heartbeat;
pub use manager::RoomHub;
