//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (connection ID, receive buffer)
//!     → Hand off to the proxy pipeline
//!
//! Outgoing origin connection
//!     → resolver.rs (static hosts, then system DNS)
//!     → plain TCP to the origin port
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection owns its receive buffer; nothing is shared
//! - No TLS: only plain HTTP is proxied

pub mod connection;
pub mod listener;
pub mod resolver;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker, MessageReader, ReadOutcome};
pub use listener::{Accepted, ConnectionPermit, Listener, ListenerError};
pub use resolver::HostResolver;
