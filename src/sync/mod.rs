//! Synchronization primitives.
//!
//! # Data Flow
//! ```text
//! Health checker (one writer)          Routers (many readers)
//!     │                                    │
//!     ▼                                    ▼
//!   write()  ──── rwlock.rs ────────────  read()
//!     │        write-preferring:            │
//!     │        a waiting writer gates       │
//!     │        all new readers              │
//!     ▼                                    ▼
//!   replace snapshot                  index + copy out
//! ```
//!
//! # Design Decisions
//! - Writer preference: snapshot installs must not be starved by a
//!   continuous stream of routing lookups
//! - Readers already inside the critical section finish undisturbed
//! - Broadcast wakeups on every release so any mix of waiters progresses

pub mod rwlock;

pub use rwlock::{ReadGuard, RwLock, WriteGuard};
