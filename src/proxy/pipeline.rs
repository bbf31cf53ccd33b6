//! Per-connection request pipeline.
//!
//! # Request Cycle
//! ```text
//! read + frame request (carry-over bytes first)
//!     ├─ Malformed ─────────────────────────▶ 400, close after writing
//!     ├─ scheme != http ────────────────────▶ 400
//!     ├─ URL banned ────────────────────────▶ 302 → URL error page
//!     ├─ error page + If-Modified-Since ────▶ 304
//!     └─ origin relay ──┬─ failure ─────────▶ 404 / 502 / 504
//!                       ├─ body banned ─────▶ 302 → content error page
//!                       └─ origin response
//! ensure Content-Length → keep-alive headers → write → next cycle
//! ```
//!
//! # Design Decisions
//! - Requests are served strictly in arrival order; pipelined bytes wait in the
//!   connection's receive buffer while the current request is relayed
//! - Every request that was read gets a complete response before the next read
//! - A Content-Length disagreeing with the body is a bug, not a client error,
//!   and ends the connection without writing

use std::io;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::http::{ContentLengthMismatch, Request, Response};
use crate::net::{MessageReader, ReadOutcome};
use crate::observability::metrics;
use crate::proxy::replies;
use crate::proxy::state::ProxyState;

/// Scheme the proxy is willing to relay.
const SUPPORTED_SCHEME: &str = "http";

/// Why a connection task stopped abnormally.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("client I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("internal invariant violated: {0}")]
    ContentLength(#[from] ContentLengthMismatch),
}

/// Result of one request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    /// Response written; read the next request.
    Continue,
    /// Response written; the client's framing can no longer be trusted.
    Close,
    /// The client closed the stream between requests.
    Eof,
}

/// Serves every request arriving on one client stream.
pub struct Pipeline<S> {
    reader: MessageReader<S>,
    state: Arc<ProxyState>,
    served: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pipeline<S> {
    pub fn new(stream: S, state: Arc<ProxyState>) -> Self {
        let chunk_size = state.config.listener.read_chunk_size;
        Self {
            reader: MessageReader::new(stream, chunk_size),
            state,
            served: 0,
        }
    }

    /// Serve requests until the client goes away. Returns how many were answered.
    pub async fn run(mut self) -> Result<usize, PipelineError> {
        loop {
            let cycle = self.serve_one().await?;
            if cycle != Cycle::Eof {
                self.served += 1;
            }
            if cycle != Cycle::Continue {
                break;
            }
        }

        tracing::info!(served = self.served, "Served requests to the client");
        Ok(self.served)
    }

    async fn serve_one(&mut self) -> Result<Cycle, PipelineError> {
        let mut request = Request::new();
        if self.reader.read_message(&mut request).await? == ReadOutcome::Eof {
            return Ok(Cycle::Eof);
        }

        let (mut response, cycle) = match request.error() {
            Some(error) => {
                tracing::warn!(error = %error, "Unparseable request");
                (replies::unparseable_request(), Cycle::Close)
            }
            None => {
                dump("CLIENT->PROXY", &request.render());
                tracing::info!(method = %request.method(), url = %request.url(), "CLIENT");
                (self.respond(&request).await, Cycle::Continue)
            }
        };

        response.ensure_content_length()?;
        response.set_keep_alive(cycle == Cycle::Continue && request.wants_keep_alive());

        let rendered = response.render();
        dump("PROXY->CLIENT", &rendered);
        let stream = self.reader.get_mut();
        stream.write_all(&rendered).await?;
        stream.flush().await?;

        metrics::record_response(response.code());
        Ok(cycle)
    }

    /// Decide the response for a well-formed request.
    async fn respond(&self, request: &Request) -> Response {
        let policy = &self.state.config.policy;
        let url = request.url();
        let rendered = url.render();

        if url.scheme != SUPPORTED_SCHEME {
            tracing::info!(scheme = %url.scheme, "Unsupported scheme");
            return replies::unsupported_scheme();
        }

        if let Some(term) = self.state.banned.find(&rendered) {
            tracing::info!(term, url = %rendered, "Blocked URL");
            metrics::record_blocked("url");
            return replies::blocked_url(policy);
        }

        if policy.is_error_page(&rendered) && request.headers.contains("If-Modified-Since") {
            tracing::debug!(url = %rendered, "Error page not modified");
            return replies::not_modified();
        }

        let start = Instant::now();
        let response = match self.state.relay().forward(request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(error = %error, url = %rendered, "Origin relay failed");
                return error.to_response();
            }
        };
        metrics::record_origin_duration(start);
        dump("SERVER->PROXY", &response.render());

        if let Some(term) = self.state.banned.find(&response.body) {
            tracing::info!(term, url = %rendered, "Blocked content");
            metrics::record_blocked("content");
            return replies::blocked_content(policy);
        }

        response
    }
}

/// Log a whole message at debug level.
fn dump(direction: &str, message: &[u8]) {
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!(content = %String::from_utf8_lossy(message), "{}", direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use crate::config::schema::{DEFAULT_URL_BLOCK_MESSAGE, DEFAULT_URL_ERROR_PAGE};
    use std::net::IpAddr;
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    fn state_with_origin_port(port: u16) -> Arc<ProxyState> {
        let mut config = ProxyConfig::default();
        config.origin.system_dns = false;
        config.origin.static_hosts.insert("closed.test".into(), IpAddr::from([127, 0, 0, 1]));
        config.origin.port = port;
        Arc::new(ProxyState::new(config))
    }

    fn offline_state() -> Arc<ProxyState> {
        state_with_origin_port(80)
    }

    fn start(state: Arc<ProxyState>) -> (MessageReader<DuplexStream>, JoinHandle<Result<usize, PipelineError>>) {
        let (client, server) = duplex(64 * 1024);
        let handle = tokio::spawn(Pipeline::new(server, state).run());
        (MessageReader::new(client, 1024), handle)
    }

    async fn send(client: &mut MessageReader<DuplexStream>, raw: &[u8]) {
        client.get_mut().write_all(raw).await.unwrap();
    }

    async fn receive(client: &mut MessageReader<DuplexStream>) -> Response {
        let mut response = Response::new();
        assert_eq!(client.read_message(&mut response).await.unwrap(), ReadOutcome::Framed);
        assert!(response.is_complete(), "{:?}", response.error());
        response
    }

    #[tokio::test]
    async fn unresolvable_host_is_404() {
        let (mut client, _handle) = start(offline_state());
        send(&mut client, b"GET http://x.example/ HTTP/1.1\r\nHost: x.example\r\n\r\n").await;

        let response = receive(&mut client).await;
        assert_eq!(response.code(), "404");
        assert!(String::from_utf8_lossy(&response.body).contains("x.example"));
    }

    #[tokio::test]
    async fn banned_url_redirects_to_first_error_page() {
        let (mut client, _handle) = start(offline_state());
        send(&mut client, b"GET /SpongeBob/page HTTP/1.1\r\nHost: x\r\n\r\n").await;

        let response = receive(&mut client).await;
        assert_eq!(response.code(), "302");
        assert_eq!(response.reason(), "Page Moved");
        assert_eq!(response.headers.get("Location"), Some(DEFAULT_URL_ERROR_PAGE));
        assert_eq!(response.body, DEFAULT_URL_BLOCK_MESSAGE.as_bytes());
    }

    #[tokio::test]
    async fn error_page_revalidation_is_304_without_origin() {
        let (mut client, _handle) = start(offline_state());
        let raw = format!(
            "GET {} HTTP/1.1\r\nIf-Modified-Since: whenever\r\n\r\n",
            DEFAULT_URL_ERROR_PAGE
        );
        send(&mut client, raw.as_bytes()).await;

        let response = receive(&mut client).await;
        assert_eq!(response.code(), "304");
        assert!(response.body.is_empty());
        assert_eq!(response.headers.get("Content-Length"), Some("0"));
    }

    #[tokio::test]
    async fn non_http_scheme_is_400_and_connection_stays_open() {
        let (mut client, _handle) = start(offline_state());
        send(
            &mut client,
            b"GET ftp://files.test/x HTTP/1.1\r\nConnection: keep-alive\r\n\r\n\
              GET /SpongeBob HTTP/1.1\r\n\r\n",
        )
        .await;

        let first = receive(&mut client).await;
        assert_eq!(first.code(), "400");
        assert_eq!(first.body, b"Only HTTP protocol is supported");
        assert_eq!(first.headers.get("Connection"), Some("keep-alive"));

        let second = receive(&mut client).await;
        assert_eq!(second.code(), "302");
        assert_eq!(second.headers.get("Connection"), Some("close"));
    }

    #[tokio::test]
    async fn pipelined_requests_are_answered_in_order() {
        let (mut client, _handle) = start(offline_state());
        send(
            &mut client,
            b"GET /SpongeBob HTTP/1.1\r\nProxy-Connection: keep-alive\r\n\r\n\
              GET http://x.example/ HTTP/1.1\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;

        let first = receive(&mut client).await;
        assert_eq!(first.code(), "302");
        assert_eq!(first.headers.get("Proxy-Connection"), Some("keep-alive"));
        assert_eq!(first.headers.get("Connection"), Some("keep-alive"));

        let second = receive(&mut client).await;
        assert_eq!(second.code(), "404");
        assert_eq!(second.headers.get("Connection"), Some("keep-alive"));
    }

    #[tokio::test]
    async fn malformed_request_gets_400_and_close() {
        let (mut client, handle) = start(offline_state());
        send(&mut client, b"GET / HTTP/1.1\r\nno colon here\r\n\r\nGET / HTTP/1.1\r\n\r\n").await;

        let response = receive(&mut client).await;
        assert_eq!(response.code(), "400");
        assert_eq!(response.body, b"Error while parsing your browsers request");
        assert_eq!(response.headers.get("Connection"), Some("close"));
        assert_eq!(response.headers.get("Proxy-Connection"), Some("close"));

        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn unsupported_version_is_malformed() {
        let (mut client, handle) = start(offline_state());
        send(&mut client, b"GET / HTTP/2.0\r\n\r\n").await;

        assert_eq!(receive(&mut client).await.code(), "400");
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn client_close_between_requests_ends_quietly() {
        let (mut client, handle) = start(offline_state());
        send(&mut client, b"GET /SpongeBob HTTP/1.0\r\n\r\n").await;
        assert_eq!(receive(&mut client).await.code(), "302");

        drop(client);
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn refused_origin_is_504() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (mut client, _handle) = start(state_with_origin_port(port));
        send(&mut client, b"GET http://closed.test/ HTTP/1.1\r\n\r\n").await;

        let response = receive(&mut client).await;
        assert_eq!(response.code(), "504");
        assert_eq!(response.body, b"Could not connect to remote server closed.test");
    }
}
