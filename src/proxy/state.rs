//! Shared, immutable state handed to every connection task.

use crate::config::ProxyConfig;
use crate::net::HostResolver;
use crate::policy::BannedTermSet;
use crate::proxy::relay::OriginRelay;

/// Everything a connection needs besides its own stream.
///
/// Built once at startup and shared through an `Arc`; never mutated.
#[derive(Debug)]
pub struct ProxyState {
    pub config: ProxyConfig,
    pub banned: BannedTermSet,
    pub resolver: HostResolver,
}

impl ProxyState {
    pub fn new(config: ProxyConfig) -> Self {
        let banned = BannedTermSet::new(config.policy.banned_terms.iter().cloned());
        let resolver = HostResolver::from_config(&config.origin);
        Self {
            config,
            banned,
            resolver,
        }
    }

    pub fn relay(&self) -> OriginRelay<'_> {
        OriginRelay::new(
            &self.resolver,
            self.config.origin.port,
            self.config.listener.read_chunk_size,
        )
    }
}
