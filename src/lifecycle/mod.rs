//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Ctrl+C (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → accept loop stops taking new connections
//!     → connection tasks already running finish on their own
//! ```
//!
//! # Design Decisions
//! - Connection tasks are never cancelled; they end on peer close or a framing error
//! - Only the accept loop listens for the shutdown signal

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
