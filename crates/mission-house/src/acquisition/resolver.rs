//! DNS resolution through a fixed list of public resolvers.
//!
//! Some networks return filtered or stale answers for the target sites, so
//! hosts are looked up on the configured public resolvers first. When that
//! lookup fails or comes back empty, the system resolver is used.

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// reqwest resolver backed by public name servers.
#[derive(Clone)]
pub struct PublicResolver {
    resolver: Arc<TokioAsyncResolver>,
}

impl PublicResolver {
    pub fn new(servers: &[IpAddr]) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(servers, 53, true);
        let config = ResolverConfig::from_parts(None, vec![], group);
        let resolver = TokioAsyncResolver::tokio(config, ResolverOpts::default());
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = Arc::clone(&self.resolver);
        Box::pin(async move {
            let host = name.as_str().to_string();

            match resolver.lookup_ip(host.as_str()).await {
                Ok(lookup) => {
                    let addrs: Vec<SocketAddr> =
                        lookup.iter().map(|ip| SocketAddr::new(ip, 0)).collect();
                    if !addrs.is_empty() {
                        let addrs: Addrs = Box::new(addrs.into_iter());
                        return Ok(addrs);
                    }
                    tracing::debug!("public resolvers returned no records for {host}");
                }
                Err(e) => {
                    tracing::debug!("public resolver lookup for {host} failed: {e}");
                }
            }

            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .collect();
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}
