//! OS signal handling.

/// Wait for Ctrl+C.
///
/// If the handler cannot be installed the error is logged and this never resolves,
/// so the proxy keeps serving instead of shutting down.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
