//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (verbosity, chunk size, ports)
//! - Check that redirect targets are absolute http URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// Highest verbosity level understood by the logger.
pub const MAX_VERBOSITY: u8 = 3;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not an IP:port address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.listener.read_chunk_size == 0 {
        errors.push(ValidationError::new("listener.read_chunk_size", "must be greater than 0"));
    }

    for (i, term) in config.policy.banned_terms.iter().enumerate() {
        if term.is_empty() {
            errors.push(ValidationError::new(format!("policy.banned_terms[{}]", i), "must not be empty"));
        }
    }
    for (field, page) in [
        ("policy.url_error_page", &config.policy.url_error_page),
        ("policy.content_error_page", &config.policy.content_error_page),
    ] {
        if let Err(message) = check_http_url(page) {
            errors.push(ValidationError::new(field, message));
        }
    }

    if config.origin.port == 0 {
        errors.push(ValidationError::new("origin.port", "must be greater than 0"));
    }

    if config.observability.verbosity > MAX_VERBOSITY {
        errors.push(ValidationError::new(
            "observability.verbosity",
            format!("must be between 0 and {}", MAX_VERBOSITY),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not an IP:port address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(text: &str) -> Result<(), String> {
    let parsed = url::Url::parse(text).map_err(|e| format!("{:?} is not a URL: {}", text, e))?;
    if parsed.scheme() != "http" || parsed.host_str().is_none() {
        return Err(format!("{:?} must be an absolute http:// URL", text));
    }
    Ok(())
}
