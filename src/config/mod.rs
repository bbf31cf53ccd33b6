//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! compiled-in defaults (schema.rs)
//!     ← optional TOML file (loader.rs)
//!     ← command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc with every connection task
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults, so the proxy runs with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::ProxyConfig;
pub use schema::{ListenerConfig, ObservabilityConfig, OriginConfig, PolicyConfig};
pub use validation::{validate_config, ValidationError};
