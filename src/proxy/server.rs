//! Accept loop.
//!
//! # Responsibilities
//! - Accept client connections within the listener's connection limit
//! - Run one [`Pipeline`] task per client
//! - Stop accepting when shutdown is signalled

use std::sync::Arc;

use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::{Accepted, ConnectionTracker, Listener, ListenerError};
use crate::proxy::pipeline::{Pipeline, PipelineError};
use crate::proxy::state::ProxyState;

/// The filtering proxy server.
pub struct ProxyServer {
    state: Arc<ProxyState>,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            state: Arc::new(ProxyState::new(config)),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// Connection tasks already running are left to finish on their own.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ListenerError> {
        if let Ok(address) = listener.local_addr() {
            tracing::info!(
                address = %address,
                banned_terms = self.state.banned.len(),
                "Proxy server starting"
            );
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Proxy server stopping");
                    listener.close();
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => self.spawn(accepted),
                    Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                },
            }
        }

        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Proxy server stopped"
        );
        Ok(())
    }

    fn spawn(&self, accepted: Accepted) {
        let Accepted {
            stream,
            peer_addr,
            permit,
        } = accepted;
        let guard = self.tracker.track();
        let state = Arc::clone(&self.state);
        let span = tracing::info_span!(
            "connection",
            connection_id = %guard.id(),
            peer_addr = %peer_addr
        );

        tokio::spawn(
            async move {
                let _permit = permit;
                let _guard = guard;

                tracing::info!("Processing connection");
                match Pipeline::new(stream, state).run().await {
                    Ok(_) => {}
                    Err(PipelineError::ContentLength(e)) => {
                        tracing::error!(error = %e, "Dropping connection");
                    }
                    Err(PipelineError::Io(e)) => {
                        tracing::debug!(error = %e, "Client connection failed");
                    }
                }
                tracing::info!("Finished connection");
            }
            .instrument(span),
        );
    }
}
