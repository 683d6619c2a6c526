//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (per traffic class)
//!     → one probe task per configured backend
//!     → GET /healthCheck, decode {"Status": int}
//!     → healthy / unhealthy id channels
//!     → collect until every backend has reported
//!     → order ids (sorted for round-robin, arrival order for random)
//!     → install snapshot under the write-lock
//! ```
//!
//! # Design Decisions
//! - Probes are independent tasks; a slow backend delays only its own verdict
//! - The snapshot swap happens once per cycle, never incrementally
//! - Probe failures demote silently; routing just stops picking the backend

pub mod monitor;

pub use monitor::HealthMonitor;
