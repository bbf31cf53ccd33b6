//! Request variant of the framing engine.
//!
//! # Responsibilities
//! - Parse `METHOD SP TARGET SP VERSION`
//! - Expose the keep-alive intent of the client
//! - Prepare the copy of a request that is forwarded to an origin
//!
//! # Design Decisions
//! - Requests without `Content-Length` have an empty body, so bytes after the
//!   header block are left for the next pipelined request
//! - The client's request is never modified; the origin gets a rewritten copy

use crate::http::message::{FramingError, Message, StartLine, Version};
use crate::http::url::Url;

/// First line of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub url: Url,
}

impl StartLine for RequestLine {
    const ASSUME_EMPTY_BODY: bool = true;

    fn parse(line: &str) -> Result<(Self, Version), FramingError> {
        let tokens: Vec<&str> = line.split(' ').collect();
        let [method, target, version] = tokens.as_slice() else {
            return Err(FramingError::TokenCount(tokens.len()));
        };

        let version = Version::parse(version)?;
        Ok((
            Self {
                method: method.to_string(),
                url: Url::parse(target),
            },
            version,
        ))
    }

    fn render(&self, version: Version) -> String {
        format!("{} {} {}", self.method, self.url.render(), version)
    }
}

/// An HTTP request.
pub type Request = Message<RequestLine>;

impl Message<RequestLine> {
    pub fn method(&self) -> &str {
        &self.head.method
    }

    pub fn url(&self) -> &Url {
        &self.head.url
    }

    /// Whether the client asked to keep the connection open.
    ///
    /// Values are compared exactly as received.
    pub fn wants_keep_alive(&self) -> bool {
        self.headers.get("Connection") == Some("keep-alive")
            || self.headers.get("Proxy-Connection") == Some("keep-alive")
    }

    /// Copy of this request as it should be sent to the origin server:
    /// relative target and `Connection: close`.
    pub fn for_origin(&self) -> Request {
        let mut headers = self.headers.clone();
        headers.set("Connection", "close");

        Message::from_parts(
            RequestLine {
                method: self.head.method.clone(),
                url: self.head.url.to_relative(),
            },
            self.version,
            headers,
            self.body.clone(),
        )
    }
}
