//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, upgrade classification)
//!     → plain request: worker.rs (admission → per-backend worker pool)
//!     → upgrade request: websocket.rs (dial upstream, relay pair)
//!     → response.rs (JSON bodies, error envelopes)
//!     → Send to client
//! ```

pub mod response;
pub mod server;
pub mod websocket;
pub mod worker;

pub use server::ProxyServer;
