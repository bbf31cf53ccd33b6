//! Request target model.
//!
//! # Responsibilities
//! - Parse absolute-form (`scheme://host/path`) and relative-form (`/path`) targets
//! - Render a target back to text exactly as it was split
//!
//! # Design Decisions
//! - No normalization (case, percent-encoding, trailing slash); the policy
//!   filter matches against the raw rendered text
//! - Relative targets default to the `http` scheme so the pipeline's scheme
//!   check treats direct requests like proxied ones

use std::fmt;

/// Default scheme for targets that do not name one.
pub const DEFAULT_SCHEME: &str = "http";

/// Whether a target named its scheme and host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// `scheme://host/path`, as sent to a forward proxy.
    Absolute,
    /// `/path`, as sent to an origin server.
    Relative,
}

/// A parsed request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub kind: UrlKind,
    pub scheme: String,
    pub host: String,
    /// Includes the leading `/`, or is empty for "the host root".
    pub path: String,
}

impl Url {
    /// Parse a request target.
    pub fn parse(text: &str) -> Self {
        let (kind, scheme, rest) = match text.split_once("://") {
            Some((scheme, rest)) => (UrlKind::Absolute, scheme.to_string(), rest),
            None => (UrlKind::Relative, DEFAULT_SCHEME.to_string(), text),
        };

        let (host, path) = match rest.find('/') {
            Some(index) => (rest[..index].to_string(), rest[index..].to_string()),
            None => (rest.to_string(), String::new()),
        };

        Self { kind, scheme, host, path }
    }

    /// Render the target in its own form.
    pub fn render(&self) -> String {
        match self.kind {
            UrlKind::Absolute => format!("{}://{}{}", self.scheme, self.host, self.path),
            UrlKind::Relative => self.path.clone(),
        }
    }

    /// Target to put on the request line sent to an origin server.
    pub fn origin_form(&self) -> &str {
        if self.path.is_empty() {
            "/"
        } else {
            &self.path
        }
    }

    /// Same target, switched to relative form.
    pub fn to_relative(&self) -> Self {
        Self {
            kind: UrlKind::Relative,
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            path: self.origin_form().to_string(),
        }
    }
}

impl Default for Url {
    fn default() -> Self {
        Self {
            kind: UrlKind::Relative,
            scheme: DEFAULT_SCHEME.to_string(),
            host: String::new(),
            path: String::new(),
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
