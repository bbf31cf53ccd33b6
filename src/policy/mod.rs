//! Content policy subsystem.
//!
//! # Data Flow
//! ```text
//! rendered request URL ──▶ filter.rs ──match──▶ 302 to the URL error page
//! framed response body ──▶ filter.rs ──match──▶ 302 to the content error page
//! ```
//!
//! # Design Decisions
//! - Terms are part of the immutable startup configuration
//! - Any match is enough; the first matching term is logged

pub mod filter;

pub use filter::BannedTermSet;
