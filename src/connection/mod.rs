//! Connection Pool (C1): owns every live client session, multiplexing
//! thousands of persistent connections with bounded per-connection memory
//! and non-blocking fan-out.

mod connection;
mod pool;

pub use connection::{Connection, TrySendError, OUTBOUND_QUEUE_CAPACITY};
pub use pool::ConnectionPool;
