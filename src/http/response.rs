//! Response variant of the framing engine.
//!
//! # Responsibilities
//! - Parse `VERSION SP CODE SP REASON` (reason may contain spaces)
//! - Build locally generated responses
//! - Reconcile `Content-Length` with the buffered body before sending
//! - Stamp keep-alive headers

use crate::http::message::{FramingError, Headers, Message, StartLine, Version};

/// First line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub code: String,
    pub reason: String,
}

impl Default for StatusLine {
    fn default() -> Self {
        Self {
            code: "200".to_string(),
            reason: "OK".to_string(),
        }
    }
}

impl StartLine for StatusLine {
    const ASSUME_EMPTY_BODY: bool = false;

    fn parse(line: &str) -> Result<(Self, Version), FramingError> {
        let tokens: Vec<&str> = line.splitn(3, ' ').collect();
        let [version, code, reason] = tokens.as_slice() else {
            return Err(FramingError::TokenCount(tokens.len()));
        };

        let version = Version::parse(version)?;
        Ok((
            Self {
                code: code.to_string(),
                reason: reason.to_string(),
            },
            version,
        ))
    }

    fn render(&self, version: Version) -> String {
        format!("{} {} {}", version, self.code, self.reason)
    }
}

/// An HTTP response.
pub type Response = Message<StatusLine>;

/// Declared `Content-Length` disagrees with the body actually held.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Content-Length {declared:?} does not match body length {actual}")]
pub struct ContentLengthMismatch {
    pub declared: String,
    pub actual: usize,
}

impl Message<StatusLine> {
    /// A locally generated plain-text response.
    pub fn synthetic(code: u16, reason: &str, body: impl Into<Vec<u8>>) -> Response {
        let body = body.into();
        let mut headers = Headers::new();
        headers.set("Content-Length", body.len().to_string());
        headers.set("Content-Type", "text/plain");

        Message::from_parts(
            StatusLine {
                code: code.to_string(),
                reason: reason.to_string(),
            },
            Version::Http11,
            headers,
            body,
        )
    }

    pub fn code(&self) -> &str {
        &self.head.code
    }

    pub fn reason(&self) -> &str {
        &self.head.reason
    }

    /// Add `Content-Length` when missing; verify it when present.
    pub fn ensure_content_length(&mut self) -> Result<(), ContentLengthMismatch> {
        match self.content_length() {
            None => {
                self.headers.set("Content-Length", self.body.len().to_string());
                Ok(())
            }
            Some(Ok(declared)) if declared == self.body.len() => Ok(()),
            Some(_) => Err(ContentLengthMismatch {
                declared: self.headers.get("Content-Length").unwrap_or_default().to_string(),
                actual: self.body.len(),
            }),
        }
    }

    /// Set both connection headers to `keep-alive` or `close`.
    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        let value = if keep_alive { "keep-alive" } else { "close" };
        self.headers.set("Proxy-Connection", value);
        self.headers.set("Connection", value);
    }
}
