//! Event Bus (C2): typed publish/subscribe with per-type, per-room, and
//! per-user filtering, plus a built-in subscriber that bridges selected
//! events out to connected clients via the connection pool (C1).

mod bus;
mod client_bridge;
mod event;
mod subscription;

pub use bus::EventBus;
pub use client_bridge::ClientBridge;
pub use event::{Event, EventType};
pub use subscription::{EventHandler, Subscription};
