//! Origin host resolution.

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;

use crate::config::OriginConfig;

/// Resolves origin host names to addresses.
///
/// Static mappings from the configuration are consulted first; system DNS is
/// used for everything else unless disabled.
#[derive(Debug, Clone, Default)]
pub struct HostResolver {
    static_hosts: HashMap<String, IpAddr>,
    system_dns: bool,
}

impl HostResolver {
    pub fn new(static_hosts: HashMap<String, IpAddr>, system_dns: bool) -> Self {
        let static_hosts = static_hosts
            .into_iter()
            .map(|(host, addr)| (host.to_ascii_lowercase(), addr))
            .collect();
        Self { static_hosts, system_dns }
    }

    pub fn from_config(config: &OriginConfig) -> Self {
        Self::new(config.static_hosts.clone(), config.system_dns)
    }

    /// Resolve `host` to one address, preferring IPv4.
    pub async fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        if host.is_empty() {
            return Err(not_found(host));
        }
        if let Some(addr) = self.static_hosts.get(&host.to_ascii_lowercase()) {
            return Ok(*addr);
        }
        if !self.system_dns {
            return Err(not_found(host));
        }

        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|socket_addr| socket_addr.ip())
            .collect();

        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| not_found(host))
    }
}

fn not_found(host: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("host {:?} not found", host))
}
