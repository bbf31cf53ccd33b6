//! HTTP/1.x message framing engine.
//!
//! # Responsibilities
//! - Consume a byte stream incrementally, in chunks of any size
//! - Parse the first line (via [`StartLine`]) and header lines
//! - Decide, byte-exactly, where the body ends
//! - Report bytes that belong to the next message as unconsumed
//!
//! # State Machine
//! ```text
//! AwaitingFirstLine ──line──▶ AwaitingHeaders ──empty line──▶ AwaitingBody ──▶ Complete
//!         │                          │                              │
//!         └──────── bad line ────────┴───── bad length / close ─────┴──────▶ Malformed
//! ```
//!
//! # Body Completion
//! - `Content-Length` present: exactly that many bytes, the excess is handed back
//! - No length, request: empty body, every body byte is handed back
//! - No length, response with `Connection: close`: body ends when the peer closes
//! - No length, other responses: whatever has been fed is the whole body

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

pub const CRLF: &[u8] = b"\r\n";

/// Protocol versions the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Parse a version token. Anything but HTTP/1.0 and HTTP/1.1 is rejected.
    pub fn parse(token: &str) -> Result<Self, FramingError> {
        match token {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            other => Err(FramingError::Version(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::Http11
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse progress of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    AwaitingFirstLine,
    AwaitingHeaders,
    AwaitingBody,
    Complete,
    Malformed,
}

/// Reason a message ended up [`Status::Malformed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("first line has {0} tokens")]
    TokenCount(usize),

    #[error("unsupported HTTP version {0:?}")]
    Version(String),

    #[error("invalid header line {0:?}")]
    Header(String),

    #[error("invalid Content-Length {0:?}")]
    ContentLength(String),

    #[error("peer closed the stream before the headers were complete")]
    ClosedBeforeBody,

    #[error("peer prematurely closed the stream: Content-Length {expected}, received {received}")]
    PrematureClose { expected: usize, received: usize },
}

/// First-line grammar of one message variant.
pub trait StartLine: Sized + Default + fmt::Debug {
    /// Whether a message without `Content-Length` has an empty body.
    const ASSUME_EMPTY_BODY: bool;

    /// Parse the first line (without its CRLF).
    fn parse(line: &str) -> Result<(Self, Version), FramingError>;

    /// Render the first line (without its CRLF).
    fn render(&self, version: Version) -> String;
}

/// Header map. Last write wins; names are compared without regard to ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any previous value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.0.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An HTTP message being framed from a byte stream, or built locally.
#[derive(Debug, Clone)]
pub struct Message<K> {
    /// Variant-specific first-line fields.
    pub head: K,
    pub version: Version,
    pub headers: Headers,
    pub body: Vec<u8>,
    status: Status,
    error: Option<FramingError>,
    /// Bytes of a line that has not been terminated yet.
    pending: Vec<u8>,
}

impl<K: StartLine> Message<K> {
    /// An empty message waiting for its first line.
    pub fn new() -> Self {
        Self {
            head: K::default(),
            version: Version::default(),
            headers: Headers::new(),
            body: Vec::new(),
            status: Status::AwaitingFirstLine,
            error: None,
            pending: Vec::new(),
        }
    }

    /// A message built locally, already complete.
    pub fn from_parts(head: K, version: Version, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            head,
            version,
            headers,
            body,
            status: Status::Complete,
            error: None,
            pending: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn error(&self) -> Option<&FramingError> {
        self.error.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }

    pub fn is_malformed(&self) -> bool {
        self.status == Status::Malformed
    }

    /// Complete or Malformed; no further bytes will be consumed.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, Status::Complete | Status::Malformed)
    }

    /// Declared body length, if the message carries one.
    pub fn content_length(&self) -> Option<Result<usize, FramingError>> {
        self.headers.get("Content-Length").map(|value| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| FramingError::ContentLength(value.to_string()))
        })
    }

    /// Whether the message announces `Connection: close`.
    pub fn connection_close(&self) -> bool {
        self.headers
            .get("Connection")
            .map(|value| value.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }

    /// Feed the next bytes of the stream.
    ///
    /// Returns how many bytes of `data` belong to this message. Anything past
    /// that count is the start of the next message and must be fed to a fresh one.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        if self.is_terminal() {
            return 0;
        }

        self.pending.extend_from_slice(data);

        while matches!(self.status, Status::AwaitingFirstLine | Status::AwaitingHeaders) {
            let Some(end) = find_crlf(&self.pending) else {
                break;
            };
            let line: Vec<u8> = self.pending.drain(..end + CRLF.len()).collect();
            self.read_line(&line[..end]);
        }

        let consumed = match self.status {
            Status::AwaitingBody => {
                self.body.append(&mut self.pending);
                let unconsumed = self.settle_body();
                debug_assert!(unconsumed <= data.len());
                data.len().saturating_sub(unconsumed)
            }
            Status::Malformed => {
                self.pending.clear();
                data.len()
            }
            _ => data.len(),
        };

        tracing::trace!(
            status = ?self.status,
            fed = data.len(),
            consumed,
            body_len = self.body.len(),
            "Framed bytes"
        );

        consumed
    }

    /// The stream ended. Decide whether what arrived is a whole message.
    pub fn close(&mut self) {
        match self.status {
            Status::Complete | Status::Malformed => {}
            Status::AwaitingFirstLine | Status::AwaitingHeaders => {
                self.fail(FramingError::ClosedBeforeBody);
            }
            Status::AwaitingBody => match self.content_length() {
                None => self.status = Status::Complete,
                Some(Ok(expected)) => {
                    let error = FramingError::PrematureClose {
                        expected,
                        received: self.body.len(),
                    };
                    tracing::warn!(error = %error, "Message truncated");
                    self.fail(error);
                }
                Some(Err(error)) => self.fail(error),
            },
        }
    }

    /// Serialize the message for the wire.
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        out.extend_from_slice(self.head.render(self.version).as_bytes());
        out.extend_from_slice(CRLF);
        for (name, value) in self.headers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(CRLF);
        }
        out.extend_from_slice(CRLF);
        out.extend_from_slice(&self.body);
        out
    }

    fn read_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        match self.status {
            Status::AwaitingFirstLine => match K::parse(&line) {
                Ok((head, version)) => {
                    self.head = head;
                    self.version = version;
                    self.status = Status::AwaitingHeaders;
                }
                Err(error) => self.fail(error),
            },
            Status::AwaitingHeaders => self.read_header(&line),
            _ => {}
        }
    }

    fn read_header(&mut self, line: &str) {
        if line.is_empty() {
            self.status = Status::AwaitingBody;
            return;
        }

        // Some servers omit the space after the colon.
        let pair = line
            .split_once(": ")
            .or_else(|| line.split_once(':'));

        match pair {
            Some((name, value)) => self.headers.set(name, value),
            None => self.fail(FramingError::Header(line.to_string())),
        }
    }

    /// Apply the completion policy. Returns the number of trailing body bytes
    /// handed back because they belong to the next message.
    fn settle_body(&mut self) -> usize {
        match self.content_length() {
            Some(Ok(expected)) => {
                if self.body.len() < expected {
                    return 0;
                }
                let excess = self.body.len() - expected;
                self.body.truncate(expected);
                self.status = Status::Complete;
                excess
            }
            Some(Err(error)) => {
                self.fail(error);
                0
            }
            None if K::ASSUME_EMPTY_BODY => {
                let excess = self.body.len();
                self.body.clear();
                self.status = Status::Complete;
                excess
            }
            // Close-delimited: only `close()` can finish it.
            None if self.connection_close() => 0,
            None => {
                self.status = Status::Complete;
                0
            }
        }
    }

    fn fail(&mut self, error: FramingError) {
        tracing::debug!(error = %error, "Malformed message");
        self.status = Status::Malformed;
        self.error = Some(error);
    }
}

impl<K: StartLine> Default for Message<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(CRLF.len()).position(|window| window == CRLF)
}
