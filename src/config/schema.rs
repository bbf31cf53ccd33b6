//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a compiled-in default so the proxy runs without a file.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Port the proxy listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 1234;

/// Terms blocked in URLs and response bodies.
pub const DEFAULT_BANNED_TERMS: &[&str] = &[
    "Sponge Bob",
    "SpongeBob",
    "Barry Manilow",
    "Edmonton Oilers",
    "BarryManilow",
    "EdmontonOilers",
    "Sponge%20Bob",
    "Barry%20Manilow",
    "Edmonton%20Oilers",
];

pub const DEFAULT_URL_BLOCK_MESSAGE: &str = "Sorry, but the Web page that you were trying to access is \
inappropriate for you, based on the URL. The page has been blocked to avoid insulting your \
intelligence. \r\nNet Ninny";

pub const DEFAULT_CONTENT_BLOCK_MESSAGE: &str = "Sorry, but the Web page that you were trying to \
access is inappropriate for you, based on some of the words it contains. The page has been \
blocked to avoid insulting your intelligence. \r\nNet Ninny";

pub const DEFAULT_URL_ERROR_PAGE: &str = "http://pages.cpsc.ucalgary.ca/~carey/CPSC441/ass1/error1.html";
pub const DEFAULT_CONTENT_ERROR_PAGE: &str = "http://pages.cpsc.ucalgary.ca/~carey/CPSC441/ass1/error2.html";

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Content policy (banned terms, block messages, error pages).
    pub policy: PolicyConfig,

    /// How origin servers are reached.
    pub origin: OriginConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:1234").
    pub bind_address: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,

    /// Size of each read from a client or origin socket.
    pub read_chunk_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_connections: 10_000,
            read_chunk_size: 100 * 1024,
        }
    }
}

/// Content policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Case-insensitive substrings that trigger a redirect.
    pub banned_terms: Vec<String>,

    /// Body of the redirect sent for a banned URL.
    pub url_block_message: String,

    /// Body of the redirect sent for banned content.
    pub content_block_message: String,

    /// Redirect target for a banned URL.
    pub url_error_page: String,

    /// Redirect target for banned content.
    pub content_error_page: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            banned_terms: DEFAULT_BANNED_TERMS.iter().map(|t| t.to_string()).collect(),
            url_block_message: DEFAULT_URL_BLOCK_MESSAGE.to_string(),
            content_block_message: DEFAULT_CONTENT_BLOCK_MESSAGE.to_string(),
            url_error_page: DEFAULT_URL_ERROR_PAGE.to_string(),
            content_error_page: DEFAULT_CONTENT_ERROR_PAGE.to_string(),
        }
    }
}

impl PolicyConfig {
    /// Whether `url` is one of the two redirect targets.
    pub fn is_error_page(&self, url: &str) -> bool {
        url == self.url_error_page || url == self.content_error_page
    }
}

/// Origin connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// TCP port used for every origin connection.
    pub port: u16,

    /// Fall back to system DNS for hosts not listed in `static_hosts`.
    pub system_dns: bool,

    /// Fixed host → address mappings, consulted before DNS.
    pub static_hosts: HashMap<String, IpAddr>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            port: 80,
            system_dns: true,
            static_hosts: HashMap::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 0 = errors only, 1 = connections and URLs, 2 = message dumps, 3 = framing internals.
    pub verbosity: u8,

    /// Explicit log filter; overrides `verbosity` when set.
    pub log_level: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            verbosity: 1,
            log_level: None,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
