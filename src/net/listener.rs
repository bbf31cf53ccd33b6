//! Client-facing TCP listener.
//!
//! # Responsibilities
//! - Bind the proxy port
//! - Accept browser connections, at most `max_connections` at a time
//! - Hand each accepted client over together with its connection slot
//!
//! # Design Decisions
//! - The slot is taken before `accept`, so excess clients wait in the kernel backlog
//! - A failed `accept` is reported to the caller, which decides whether to keep going

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// The bind address was unusable.
    Bind { address: String, source: io::Error },
    /// Accepting one client failed; the listener itself is still usable.
    Accept(io::Error),
    /// The connection-limit semaphore was closed.
    Closed,
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerError::Bind { address, source } => {
                write!(f, "Failed to bind {}: {}", address, source)
            }
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Closed => write!(f, "Listener closed"),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind { source, .. } | ListenerError::Accept(source) => Some(source),
            ListenerError::Closed => None,
        }
    }
}

/// A browser connection that has been accepted.
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    /// Released when dropped, freeing the slot for the next client.
    pub permit: ConnectionPermit,
}

/// Listener that serves a bounded number of clients at once.
pub struct Listener {
    inner: TcpListener,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to `config.bind_address`.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            address: config.bind_address.clone(),
            source,
        };

        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| bind_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;

        Self::from_tcp(listener, config.max_connections)
    }

    /// Wrap an already bound listener.
    pub fn from_tcp(listener: TcpListener, max_connections: usize) -> Result<Self, ListenerError> {
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: "<pre-bound>".to_string(),
            source,
        })?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Proxy listening"
        );

        Ok(Self {
            inner: listener,
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Wait for a free slot, then for the next client.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        // Responses are written whole; don't hold back the tail segment.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %peer_addr, error = %e, "Could not set TCP_NODELAY");
        }

        tracing::debug!(
            peer_addr = %peer_addr,
            free_slots = self.slots.available_permits(),
            "Client accepted"
        );

        Ok(Accepted {
            stream,
            peer_addr,
            permit: ConnectionPermit { _permit: permit },
        })
    }

    /// Stop handing out slots; pending and future `accept` calls fail with `Closed`.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Slots not currently held by a client.
    pub fn available_permits(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// One client slot. Dropping it lets the next client in.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
