//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request classified (HTTP / WebSocket)
//!     → request_id.rs (take the next id for the class)
//!     → pool.rs (read-lock snapshot, index = id mod len, copy out)
//!     → backend.rs (descriptor: address + per-backend worker state)
//!     → admission / relay takes over
//! ```
//!
//! # Design Decisions
//! - Selection is `request_id mod snapshot_len` for both algorithms; the
//!   health checker controls snapshot order, which is what makes
//!   round-robin actually rotate
//! - The snapshot is replaced wholesale, never edited in place
//! - No I/O happens while the snapshot read-lock is held

pub mod backend;
pub mod pool;
pub mod request_id;

pub use backend::{Endpoint, HttpBackend, WsBackend};
pub use pool::HealthyPool;
pub use request_id::RequestIdCounter;
