//! Origin relay.
//!
//! # Responsibilities
//! - Resolve the origin host and open a fresh TCP connection per request
//! - Forward the request with `Connection: close`
//! - Frame the origin's response with the same engine used for clients
//!
//! # Design Decisions
//! - No pooling: the origin connection is dropped as soon as the response is framed
//! - `Connection: close` makes close-delimited origin bodies unambiguous
//! - Every failure maps to exactly one locally generated response

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::http::{FramingError, Request, Response};
use crate::net::{HostResolver, MessageReader, ReadOutcome};
use crate::proxy::replies;

/// Failure while talking to an origin server.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("host {host} was not found: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("could not connect to {host} at {addr}: {source}")]
    Connect {
        host: String,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("error sending request to origin: {0}")]
    Send(#[source] io::Error),

    #[error("error reading response from origin: {0}")]
    Receive(#[source] io::Error),

    #[error("origin closed the connection without responding")]
    NoResponse,

    #[error("malformed origin response: {0}")]
    Malformed(#[from] FramingError),
}

impl RelayError {
    /// Response sent to the client in place of the origin's.
    pub fn to_response(&self) -> Response {
        match self {
            RelayError::Resolve { host, .. } => replies::host_not_found(host),
            RelayError::Connect { host, .. } => replies::connect_failed(host),
            RelayError::Send(_) => replies::send_failed(),
            RelayError::Receive(_) | RelayError::NoResponse | RelayError::Malformed(_) => {
                replies::receive_failed()
            }
        }
    }
}

/// Forwards requests to origin servers.
#[derive(Debug, Clone, Copy)]
pub struct OriginRelay<'a> {
    resolver: &'a HostResolver,
    port: u16,
    read_chunk_size: usize,
}

impl<'a> OriginRelay<'a> {
    pub fn new(resolver: &'a HostResolver, port: u16, read_chunk_size: usize) -> Self {
        Self {
            resolver,
            port,
            read_chunk_size,
        }
    }

    /// Send `request` to its origin and frame the response.
    pub async fn forward(&self, request: &Request) -> Result<Response, RelayError> {
        let host = request.url().host.as_str();

        let ip = self
            .resolver
            .resolve(host)
            .await
            .map_err(|source| RelayError::Resolve {
                host: host.to_string(),
                source,
            })?;
        let addr = SocketAddr::new(ip, self.port);

        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(|source| RelayError::Connect {
                host: host.to_string(),
                addr,
                source,
            })?;

        let forwarded = request.for_origin().render();
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(origin = %addr, content = %String::from_utf8_lossy(&forwarded), "PROXY->SERVER");
        }
        stream.write_all(&forwarded).await.map_err(RelayError::Send)?;
        stream.flush().await.map_err(RelayError::Send)?;

        let mut response = Response::new();
        let mut reader = MessageReader::new(&mut stream, self.read_chunk_size);
        let outcome = reader
            .read_message(&mut response)
            .await
            .map_err(RelayError::Receive)?;

        if outcome == ReadOutcome::Eof {
            return Err(RelayError::NoResponse);
        }
        if let Some(error) = response.error() {
            return Err(RelayError::Malformed(error.clone()));
        }

        tracing::debug!(
            origin = %addr,
            code = %response.code(),
            body_len = response.body.len(),
            "Origin responded"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::IpAddr;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn origin(reply: &'static [u8]) -> (u16, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = vec![0; 4096];
            let n = socket.read(&mut received).await.unwrap();
            received.truncate(n);
            socket.write_all(reply).await.unwrap();
            received
        });
        (port, handle)
    }

    fn resolver() -> HostResolver {
        HostResolver::new(HashMap::from([("origin.test".to_string(), IpAddr::from([127, 0, 0, 1]))]), false)
    }

    fn request(raw: &[u8]) -> Request {
        let mut request = Request::new();
        request.feed(raw);
        request
    }

    #[tokio::test]
    async fn forwards_relative_request_with_close() {
        let (port, handle) = origin(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi").await;
        let resolver = resolver();
        let relay = OriginRelay::new(&resolver, port, 1024);

        let response = relay
            .forward(&request(b"GET http://origin.test/page HTTP/1.1\r\nConnection: keep-alive\r\n\r\n"))
            .await
            .unwrap();
        assert_eq!(response.code(), "200");
        assert_eq!(response.body, b"hi");

        let sent = String::from_utf8(handle.await.unwrap()).unwrap();
        assert!(sent.starts_with("GET /page HTTP/1.1\r\n"));
        assert!(sent.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn unknown_host_is_resolve_error() {
        let resolver = resolver();
        let relay = OriginRelay::new(&resolver, 80, 1024);
        let err = relay
            .forward(&request(b"GET http://x.example/ HTTP/1.1\r\n\r\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Resolve { .. }));
        assert_eq!(err.to_response().code(), "404");
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let resolver = resolver();
        let relay = OriginRelay::new(&resolver, port, 1024);
        let err = relay
            .forward(&request(b"GET http://origin.test/ HTTP/1.1\r\n\r\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Connect { .. }));
        assert_eq!(err.to_response().code(), "504");
    }

    #[tokio::test]
    async fn garbage_response_is_malformed() {
        let (port, _handle) = origin(b"SMTP ready\r\n").await;
        let resolver = resolver();
        let relay = OriginRelay::new(&resolver, port, 1024);
        let err = relay
            .forward(&request(b"GET http://origin.test/ HTTP/1.1\r\n\r\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Malformed(_)));
        assert_eq!(err.to_response().code(), "502");
    }

    #[tokio::test]
    async fn silent_origin_is_no_response() {
        let (port, _handle) = origin(b"").await;
        let resolver = resolver();
        let relay = OriginRelay::new(&resolver, port, 1024);
        let err = relay
            .forward(&request(b"GET http://origin.test/ HTTP/1.1\r\n\r\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NoResponse));
    }
}
