//! Async resolver hook backed by hickory-dns.
//!
//! Lookups run on a private tokio runtime and complete their promises from
//! its worker thread, so the carrier thread never waits on DNS I/O. System
//! DNS configuration is auto-detected with a defaults fallback.

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::{
    config::{LookupIpStrategy, ResolverConfig},
    lookup_ip::LookupIp,
    name_server::TokioConnectionProvider,
    TokioResolver,
};
use tokio::runtime::{Builder, Runtime};

use crate::dns::hook::{AddressPromise, HookCapabilities, NamePromise, ResolveHook};

/// Resolver hook that answers with hickory-dns.
///
/// Handles both directions. Lookup failures decline the promise, sending
/// the caller down the blocking path. The forward timeout hint is enforced
/// here: on expiry the request is declined rather than errored, per the
/// hook contract.
///
/// # Example
///
/// ```rust,ignore
/// use fibernet::dns::HickoryHook;
/// use fibernet::fiber::FiberScheduler;
/// use std::sync::Arc;
///
/// let hook = HickoryHook::new()?;
/// let mut scheduler = FiberScheduler::with_hook(Arc::new(hook));
/// ```
pub struct HickoryHook {
    runtime: Runtime,
    resolver: TokioResolver,
}

impl HickoryHook {
    /// Builds the hook and its single-worker runtime.
    ///
    /// Reads the system DNS configuration when possible; otherwise falls
    /// back to sensible defaults.
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .thread_name("fibernet-dns")
            .build()?;

        // The connection provider captures the ambient runtime handle.
        let guard = runtime.enter();
        let mut builder = match TokioResolver::builder_tokio() {
            Ok(builder) => {
                tracing::debug!("using system DNS configuration");
                builder
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "failed to read system DNS config, using defaults"
                );
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
            }
        };

        // Dual-stack lookups, IPv4 answers first.
        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        let resolver = builder.build();
        drop(guard);

        Ok(HickoryHook { runtime, resolver })
    }
}

impl ResolveHook for HickoryHook {
    fn capabilities(&self) -> HookCapabilities {
        HookCapabilities::all()
    }

    fn resolve_address(&self, hostname: &str, timeout: Option<Duration>, promise: AddressPromise) {
        let resolver = self.resolver.clone();
        let hostname = hostname.to_string();
        self.runtime.spawn(async move {
            tracing::debug!(host = %hostname, "resolving via hickory-dns");
            match lookup_with_deadline(&resolver, &hostname, timeout).await {
                Ok(lookup) => {
                    let addresses: Vec<String> = lookup.iter().map(|ip| ip.to_string()).collect();
                    tracing::debug!(
                        host = %hostname,
                        count = addresses.len(),
                        "hickory-dns resolution complete"
                    );
                    promise.fulfill(addresses);
                }
                Err(reason) => {
                    tracing::debug!(host = %hostname, error = %reason, "hickory-dns lookup failed");
                    promise.decline();
                }
            }
        });
    }

    fn resolve_name(&self, address: IpAddr, promise: NamePromise) {
        let resolver = self.resolver.clone();
        self.runtime.spawn(async move {
            tracing::debug!(address = %address, "reverse resolving via hickory-dns");
            match resolver.reverse_lookup(address).await {
                Ok(lookup) => match lookup.iter().next() {
                    Some(ptr) => {
                        let hostname = ptr.0.to_utf8();
                        promise.fulfill(hostname.trim_end_matches('.').to_string());
                    }
                    None => promise.decline(),
                },
                Err(error) => {
                    tracing::debug!(
                        address = %address,
                        error = %error,
                        "hickory-dns reverse lookup failed"
                    );
                    promise.decline();
                }
            }
        });
    }
}

impl fmt::Debug for HickoryHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HickoryHook").finish_non_exhaustive()
    }
}

async fn lookup_with_deadline(
    resolver: &TokioResolver,
    hostname: &str,
    timeout: Option<Duration>,
) -> Result<LookupIp, String> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, resolver.lookup_ip(hostname)).await {
            Ok(result) => result.map_err(|error| error.to_string()),
            Err(_) => Err(format!("timed out after {limit:?}")),
        },
        None => resolver
            .lookup_ip(hostname)
            .await
            .map_err(|error| error.to_string()),
    }
}
