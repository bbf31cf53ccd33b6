//! Connection identity, lifecycle tracking, and the per-connection receive buffer.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count active connections
//! - Buffer bytes read from a peer that belong to the next pipelined message

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::message::{Message, StartLine};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts live connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        crate::observability::metrics::record_active_connections(active);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        crate::observability::metrics::record_active_connections(active);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// How a call to [`MessageReader::read_message`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The message reached Complete or Malformed.
    Framed,
    /// The stream ended before any byte of the message arrived.
    Eof,
}

/// Reads messages from a stream, keeping bytes that belong to later messages.
///
/// A single read may return the tail of one message and the start of the
/// next. Whatever the framing engine does not consume stays in `carry` and is
/// fed first to the next message.
#[derive(Debug)]
pub struct MessageReader<R> {
    inner: R,
    carry: Vec<u8>,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            carry: Vec::new(),
            chunk: vec![0; chunk_size.max(1)],
        }
    }

    /// Frame one message from the stream.
    pub async fn read_message<K: StartLine>(&mut self, message: &mut Message<K>) -> io::Result<ReadOutcome> {
        let mut seen = false;

        if !self.carry.is_empty() {
            seen = true;
            let consumed = message.feed(&self.carry);
            self.carry.drain(..consumed);
        }

        while !message.is_terminal() {
            let n = self.inner.read(&mut self.chunk).await?;
            if n == 0 {
                if !seen {
                    return Ok(ReadOutcome::Eof);
                }
                message.close();
                break;
            }

            seen = true;
            let consumed = message.feed(&self.chunk[..n]);
            self.carry.extend_from_slice(&self.chunk[consumed.min(n)..n]);
            tracing::trace!(read = n, consumed, carried = self.carry.len(), "Read from peer");
        }

        Ok(ReadOutcome::Framed)
    }

    /// Bytes received but not yet attributed to a message.
    pub fn buffered(&self) -> &[u8] {
        &self.carry
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response, Status};
    use tokio::io::AsyncWriteExt;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(guard1.id(), guard2.id());

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn pipelined_requests_share_one_buffer() {
        let raw: &[u8] = b"GET /a HTTP/1.1\r\nConnection: keep-alive\r\n\r\n\
                           POST /b HTTP/1.1\r\nContent-Length: 3\r\n\r\nxyz\
                           GET /c HTTP/1.1\r\n\r\n";
        let mut reader = MessageReader::new(raw, 7);

        let mut paths = Vec::new();
        loop {
            let mut request = Request::new();
            if reader.read_message(&mut request).await.unwrap() == ReadOutcome::Eof {
                break;
            }
            assert!(request.is_complete());
            paths.push((request.url().path.clone(), request.body.clone()));
        }

        assert_eq!(
            paths,
            vec![
                ("/a".to_string(), Vec::new()),
                ("/b".to_string(), b"xyz".to_vec()),
                ("/c".to_string(), Vec::new()),
            ]
        );
        assert!(reader.buffered().is_empty());
    }

    #[tokio::test]
    async fn one_large_read_keeps_the_rest() {
        let raw: &[u8] = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let mut reader = MessageReader::new(raw, 1024);

        let mut first = Request::new();
        reader.read_message(&mut first).await.unwrap();
        assert_eq!(reader.buffered(), b"GET /b HTTP/1.1\r\n\r\n");
    }

    #[tokio::test]
    async fn close_delimited_response_ends_at_eof() {
        let (mut origin, proxy_side) = tokio::io::duplex(64);
        tokio::spawn(async move {
            origin
                .write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nfirst ")
                .await
                .unwrap();
            origin.write_all(b"second").await.unwrap();
        });

        let mut reader = MessageReader::new(proxy_side, 16);
        let mut response = Response::new();
        assert_eq!(reader.read_message(&mut response).await.unwrap(), ReadOutcome::Framed);
        assert!(response.is_complete());
        assert_eq!(response.body, b"first second");
    }

    #[tokio::test]
    async fn eof_mid_message_is_malformed() {
        let raw: &[u8] = b"GET /a HTTP/1.1\r\nHost:";
        let mut reader = MessageReader::new(raw, 64);
        let mut request = Request::new();
        assert_eq!(reader.read_message(&mut request).await.unwrap(), ReadOutcome::Framed);
        assert_eq!(request.status(), Status::Malformed);
    }

    #[tokio::test]
    async fn eof_between_messages_is_reported() {
        let raw: &[u8] = b"";
        let mut reader = MessageReader::new(raw, 64);
        let mut request = Request::new();
        assert_eq!(reader.read_message(&mut request).await.unwrap(), ReadOutcome::Eof);
    }
}
