//! Fixed-table resolver hook.
//!
//! Answers from tables built at construction time and declines everything
//! else. The workhorse for tests and for pinning a handful of hosts without
//! touching real DNS.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use crate::dns::hook::{AddressPromise, HookCapabilities, NamePromise, ResolveHook};

/// A hook answering from fixed host and address tables.
///
/// Capabilities follow the tables: a hook with only host entries advertises
/// forward resolution only. Targets without an entry are declined, so
/// lookups for them take the blocking path.
///
/// ```rust,ignore
/// let hook = StaticHook::new()
///     .host("example.com", ["1.2.3.4", "1234:1234:123:1:123:1234:1234:1234"])
///     .name("1.2.3.4".parse().unwrap(), "example.com");
/// ```
#[derive(Debug, Default, Clone)]
pub struct StaticHook {
    hosts: HashMap<String, Vec<String>>,
    names: HashMap<IpAddr, String>,
}

impl StaticHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the forward entry for `host`.
    ///
    /// An entry with no addresses is a real answer: lookups for that host
    /// fail instead of falling back.
    pub fn host(
        mut self,
        host: impl Into<String>,
        addresses: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.hosts
            .insert(host.into(), addresses.into_iter().map(Into::into).collect());
        self
    }

    /// Adds (or replaces) the reverse entry for `address`.
    pub fn name(mut self, address: IpAddr, hostname: impl Into<String>) -> Self {
        self.names.insert(address, hostname.into());
        self
    }
}

impl ResolveHook for StaticHook {
    fn capabilities(&self) -> HookCapabilities {
        let mut capabilities = HookCapabilities::empty();
        if !self.hosts.is_empty() {
            capabilities |= HookCapabilities::RESOLVE_ADDRESS;
        }
        if !self.names.is_empty() {
            capabilities |= HookCapabilities::RESOLVE_NAME;
        }
        capabilities
    }

    fn resolve_address(&self, hostname: &str, _timeout: Option<Duration>, promise: AddressPromise) {
        match self.hosts.get(hostname) {
            Some(addresses) => {
                tracing::debug!(host = %hostname, count = addresses.len(), "static table answered");
                promise.fulfill(addresses.clone());
            }
            None => promise.decline(),
        }
    }

    fn resolve_name(&self, address: IpAddr, promise: NamePromise) {
        match self.names.get(&address) {
            Some(hostname) => promise.fulfill(hostname.clone()),
            None => promise.decline(),
        }
    }
}
