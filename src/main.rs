//! Filtering HTTP/1.1 Forward Proxy
//!
//! A forward proxy that refuses to serve pages whose URL or body mentions a
//! banned term, redirecting the browser to an error page instead.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                 FILTERING PROXY                  │
//!                         │                                                  │
//!     Browser request     │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!     ────────────────────┼─▶│   net   │──▶│  proxy   │──▶│    policy    │   │
//!                         │  │listener │   │ pipeline │   │ banned terms │   │
//!                         │  └─────────┘   └────┬─────┘   └──────────────┘   │
//!                         │                     │                            │
//!                         │                     ▼                            │
//!     Browser response    │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!     ◀───────────────────┼──│  http   │◀──│  proxy   │◀──│ net resolver │◀──┼──── Origin
//!                         │  │ framing │   │  relay   │   │  + TCP :80   │   │     Server
//!                         │  └─────────┘   └──────────┘   └──────────────┘   │
//!                         │                                                  │
//!                         │  config · observability · lifecycle              │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use filtering_proxy::config::{self, ProxyConfig};
use filtering_proxy::lifecycle::{shutdown_signal, Shutdown};
use filtering_proxy::net::Listener;
use filtering_proxy::observability::{logging, metrics};
use filtering_proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "filtering-proxy")]
#[command(about = "Filtering HTTP/1.1 forward proxy", long_about = None)]
struct Cli {
    /// Port to listen on (overrides the configured bind address port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Diagnostic output level, 0 (quiet) to 3 (framing internals)
    #[arg(short, long)]
    verbosity: Option<u8>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{}", port),
            };
        }
        if let Some(verbosity) = self.verbosity {
            config.observability.verbosity = verbosity;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::read_config(cli.config.as_deref())?;
    cli.apply(&mut config);
    config::validate_config(&config).map_err(config::ConfigError::from)?;

    logging::init(&config.observability)?;

    tracing::info!("filtering-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        banned_terms = config.policy.banned_terms.len(),
        verbosity = config.observability.verbosity,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on(shutdown_signal());

    ProxyServer::new(config)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
