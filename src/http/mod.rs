//! HTTP message subsystem.
//!
//! # Data Flow
//! ```text
//! bytes from a peer
//!     → message.rs (framing engine: first line, headers, body completion)
//!         → request.rs  (METHOD TARGET VERSION, empty body by default)
//!         → response.rs (VERSION CODE REASON, body may be close-delimited)
//!     → url.rs (request target model)
//! ```
//!
//! # Design Decisions
//! - One engine, generic over the first-line grammar; no dynamic dispatch
//! - The engine reports how many fed bytes it used so pipelined messages
//!   start at the correct offset

pub mod message;
pub mod request;
pub mod response;
pub mod url;

pub use message::{FramingError, Headers, Message, StartLine, Status, Version};
pub use request::{Request, RequestLine};
pub use response::{ContentLengthMismatch, Response, StatusLine};
pub use url::{Url, UrlKind};
