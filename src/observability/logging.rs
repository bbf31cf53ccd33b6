//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Map the verbosity level onto a log filter
//!
//! # Verbosity
//! - 0: warnings and errors only
//! - 1: connections and URLs retrieved
//! - 2: every message passing through the proxy
//! - 3: framing internals

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directive for a verbosity level.
pub fn verbosity_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("{}={}", env!("CARGO_CRATE_NAME"), level)
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the config.
pub fn init(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let directive = config
        .log_level
        .clone()
        .unwrap_or_else(|| verbosity_directive(config.verbosity));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| directive.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
