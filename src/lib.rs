//! Filtering HTTP/1.1 Forward Proxy Library

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod proxy;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use proxy::{ProxyServer, ProxyState};
