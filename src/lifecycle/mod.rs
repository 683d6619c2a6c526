//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Spawn workers + monitors → Serve
//!
//! Shutdown:
//!     Ctrl-C → Shutdown::trigger() → acceptor stops → in-flight drains,
//!     capped at DRAIN_GRACE
//! ```
//!
//! # Design Decisions
//! - The signal is a latch: late waiters observe it, repeat triggers are
//!   no-ops
//! - Draining is bounded; a wedged connection cannot hold the process open

pub mod shutdown;

pub use shutdown::{Shutdown, DRAIN_GRACE};
