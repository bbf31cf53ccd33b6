//! Filtering forward proxy.
//!
//! # Data Flow
//! ```text
//! Listener::accept (net)
//!     → ProxyServer spawns one task per client (server.rs)
//!     → Pipeline frames and answers each request in order (pipeline.rs)
//!         → policy checks against the banned terms (policy)
//!         → OriginRelay fetches from the origin (relay.rs)
//!         → replies.rs builds every locally generated response
//! ```

pub mod pipeline;
pub mod relay;
pub mod replies;
pub mod server;
pub mod state;

pub use pipeline::{Pipeline, PipelineError};
pub use relay::{OriginRelay, RelayError};
pub use server::ProxyServer;
pub use state::ProxyState;
