use crate::error::QueryError;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// How a host string became connectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Literal,
    Dns,
    /// Lookup failed; the configured string is passed on untouched.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHost {
    pub address: String,
    pub resolution: Resolution,
}

/// Resolves configured hosts once per query. Results are never cached, so a
/// server moving to a new address is picked up on the next query.
pub struct AddressResolver {
    resolver: TokioAsyncResolver,
    lookup_timeout: Duration,
}

impl AddressResolver {
    pub fn new(lookup_timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.cache_size = 0;
        opts.attempts = 1;
        opts.use_hosts_file = true;
        opts.timeout = lookup_timeout;

        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
            lookup_timeout,
        }
    }

    pub async fn resolve(&self, host: &str) -> ResolvedHost {
        let host = host.trim();
        if host.parse::<IpAddr>().is_ok() {
            return ResolvedHost {
                address: host.to_string(),
                resolution: Resolution::Literal,
            };
        }

        match self.lookup(host).await {
            Ok(ip) => ResolvedHost {
                address: ip.to_string(),
                resolution: Resolution::Dns,
            },
            Err(e) => {
                debug!("{}", e);
                ResolvedHost {
                    address: host.to_string(),
                    resolution: Resolution::Deferred,
                }
            }
        }
    }

    async fn lookup(&self, host: &str) -> Result<IpAddr, QueryError> {
        let deferred = || QueryError::AddressResolutionDeferred(host.to_string());
        let lookup = timeout(self.lookup_timeout, self.resolver.lookup_ip(host))
            .await
            .map_err(|_| deferred())?
            .map_err(|_| deferred())?;
        lookup.iter().next().ok_or_else(deferred)
    }
}
