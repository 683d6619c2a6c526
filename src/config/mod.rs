//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, fold server<N>_* keys into backend lists)
//!     → validation.rs (semantic checks, errors collected)
//!     → ProxyConfig (validated, immutable)
//!     → shared with all subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Backend ids are 1-origin and must be contiguous
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    Algorithm, FrontendConfig, HttpBackendConfig, HttpConfig, ObservabilityConfig, ProxyConfig,
    WebsocketConfig, WsBackendConfig,
};
