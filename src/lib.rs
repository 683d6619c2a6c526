//! Reverse proxy and load balancer for HTTP and WebSocket backend pools.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌────────────────────────────────────────────────────┐
//!                         │                   RELAY PROXY                      │
//!                         │                                                    │
//!     Client Request      │  ┌─────────┐     ┌──────────────┐                 │
//!     ────────────────────┼─▶│  http   │────▶│ classify:    │                 │
//!                         │  │ server  │     │ upgrade?     │                 │
//!                         │  └─────────┘     └──────┬───────┘                 │
//!                         │                         │                         │
//!                         │         ┌───────────────┴───────────────┐         │
//!                         │         ▼                               ▼         │
//!                         │  ┌──────────────┐                ┌─────────────┐  │
//!                         │  │ worker pool  │                │  websocket  │  │
//!                         │  │ (admission + │                │  relay pair │  │
//!                         │  │  dispatch)   │                └──────┬──────┘  │
//!                         │  └──────┬───────┘                       │         │
//!                         │         │                               │         │
//!     Client Response     │         ▼                               ▼         │
//!     ◀───────────────────┼── HTTP backend pool       WebSocket backend pool  │
//!                         │                                                    │
//!                         │  ┌──────────────────────────────────────────────┐ │
//!                         │  │            Cross-Cutting Concerns            │ │
//!                         │  │  ┌────────┐ ┌────────┐ ┌─────────────────┐  │ │
//!                         │  │  │ config │ │ health │ │  observability  │  │ │
//!                         │  │  └────────┘ └────────┘ └─────────────────┘  │ │
//!                         │  │  ┌─────────────────┐ ┌─────────────────┐    │ │
//!                         │  │  │  sync (rw lock) │ │    lifecycle    │    │ │
//!                         │  │  └─────────────────┘ └─────────────────┘    │ │
//!                         │  └──────────────────────────────────────────────┘ │
//!                         └────────────────────────────────────────────────────┘
//! ```
//!
//! Requests arriving on the single frontend socket are classified by their
//! upgrade headers. Plain HTTP requests are handed to a per-backend elastic
//! worker pool; WebSocket upgrades become a pair of frame-relay tasks. A
//! periodic health checker rebuilds the routable snapshot for each traffic
//! class under a write-preferring readers-writer lock.

// Core subsystems
pub mod config;
pub mod http;
pub mod sync;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
