//! Resolution Facade
//!
//! [`Resolver`] is the entry point fibers use for lookups. Each operation
//! first offers the request to the scheduler's hook; when delegation is
//! impossible (not inside a fiber, no hook, missing capability) or the hook
//! declines, the request falls back to the blocking syscalls in
//! [`crate::dns`]'s fallback path.
//!
//! Numeric literals never leave the facade: they are expanded into records
//! directly, bypassing hook and syscall alike. The same applies to the
//! `"<any>"` and `"<broadcast>"` tokens and to an absent host, which stand
//! for well-known addresses rather than names.

use std::cell::RefCell;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::rc::Weak;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::base::error::ResolveError;
use crate::dns::fallback;
use crate::dns::hook::{AddressPromise, HookCapabilities, HookReply, NamePromise};
use crate::dns::record::{
    AddressFamily, AddressQuery, AddressRecord, AiFlags, HostEntry, NameRecord, NiFlags,
    SocketType,
};
use crate::dns::service;
use crate::fiber::{Core, LoopEvent};

/// Resolution facade bound to one scheduler.
///
/// Cheap to clone and safe to keep after the scheduler is gone: operations
/// then behave exactly like the no-hook blocking path. Obtained from
/// [`FiberScheduler::resolver`](crate::fiber::FiberScheduler::resolver).
#[derive(Clone)]
pub struct Resolver {
    core: Weak<RefCell<Core>>,
    events: Sender<LoopEvent>,
}

impl Resolver {
    pub(crate) fn new(core: Weak<RefCell<Core>>, events: Sender<LoopEvent>) -> Self {
        Resolver { core, events }
    }

    /// Resolves `host` into addressing records, like `getaddrinfo(3)`.
    ///
    /// Inside a fiber with a capable hook installed the lookup is delegated
    /// and the fiber suspends until the hook answers; everywhere else it
    /// blocks. An absent `host` means loopback. See [`lookup`](Self::lookup)
    /// for the remaining knobs.
    pub async fn getaddrinfo(
        &self,
        host: Option<&str>,
        port: u16,
        family: Option<AddressFamily>,
        socket_type: Option<SocketType>,
    ) -> Result<Vec<AddressRecord>, ResolveError> {
        let mut query = AddressQuery::new().port(port);
        if let Some(host) = host {
            query = query.host(host);
        }
        if let Some(family) = family {
            query = query.family(family);
        }
        if let Some(socket_type) = socket_type {
            query = query.socket_type(socket_type);
        }
        self.lookup(query).await
    }

    /// Resolves an [`AddressQuery`].
    ///
    /// Record expansion follows the classic resolver rules: the family
    /// constraint filters, the port is stamped onto every record, and an
    /// unspecified socket type expands each address into a Stream/Dgram
    /// pair. Ending up with no records is an error, even when the hook
    /// fulfilled the request; an empty answer is not a decline.
    pub async fn lookup(&self, query: AddressQuery) -> Result<Vec<AddressRecord>, ResolveError> {
        let addresses = match host_target(&query) {
            HostTarget::Literal(addresses) => addresses,
            HostTarget::Name(name) => match self.delegate_address(&name, query.timeout).await {
                Some(raw) => parse_hook_addresses(raw),
                None => fallback::resolve_host(&name)?,
            },
        };

        let records = expand_records(addresses, &query);
        if records.is_empty() {
            return Err(ResolveError::AddressNotFound);
        }
        Ok(records)
    }

    /// Reverse lookup, like `getnameinfo(3)`.
    ///
    /// An absent `address` means the loopback literal for `family`. With
    /// [`NiFlags::NUMERIC_HOST`] the literal is returned untouched;
    /// otherwise the hook (if capable) and then the blocking syscall are
    /// consulted. When no name turns up, the numeric literal is returned,
    /// unless [`NiFlags::NAME_REQUIRED`] makes that a failure.
    ///
    /// The service name is always looked up in the local port table, never
    /// delegated.
    pub async fn getnameinfo(
        &self,
        family: AddressFamily,
        port: u16,
        address: Option<&str>,
        flags: NiFlags,
    ) -> Result<NameRecord, ResolveError> {
        let service = service::name_for(port);
        let literal = match address {
            Some(address) => address.to_string(),
            None => family_loopback(family).to_string(),
        };

        if flags.contains(NiFlags::NUMERIC_HOST) {
            return Ok(NameRecord {
                hostname: literal,
                service,
            });
        }

        let parsed: IpAddr = literal.parse().map_err(|_| {
            tracing::debug!(address = %literal, "reverse lookup target is not an address");
            ResolveError::NameNotFound
        })?;

        let resolved = match self.delegate_name(parsed).await {
            Some(name) => Some(name),
            None => fallback::resolve_addr(parsed),
        };

        match resolved {
            Some(hostname) => Ok(NameRecord { hostname, service }),
            None if flags.contains(NiFlags::NAME_REQUIRED) => Err(ResolveError::NameNotFound),
            None => Ok(NameRecord {
                hostname: literal,
                service,
            }),
        }
    }

    /// Single best record for a TCP connection to `host:port`.
    pub async fn tcp(&self, host: &str, port: u16) -> Result<AddressRecord, ResolveError> {
        self.first(
            AddressQuery::new()
                .host(host)
                .port(port)
                .socket_type(SocketType::Stream),
        )
        .await
    }

    /// Single best record for a UDP peer at `host:port`.
    pub async fn udp(&self, host: &str, port: u16) -> Result<AddressRecord, ResolveError> {
        self.first(
            AddressQuery::new()
                .host(host)
                .port(port)
                .socket_type(SocketType::Dgram),
        )
        .await
    }

    /// Single best address record for `host`, with no port or type attached.
    pub async fn ip(&self, host: &str) -> Result<AddressRecord, ResolveError> {
        self.first(AddressQuery::new().host(host)).await
    }

    /// Whole-host lookup: one entry naming every distinct address, like the
    /// classic `gethostbyname(3)`.
    pub async fn gethostbyname(&self, host: &str) -> Result<HostEntry, ResolveError> {
        let records = self
            .lookup(
                AddressQuery::new()
                    .host(host)
                    .socket_type(SocketType::Stream),
            )
            .await?;
        let family = records
            .first()
            .map(AddressRecord::family)
            .ok_or(ResolveError::AddressNotFound)?;
        let mut addresses: Vec<String> = Vec::new();
        for record in &records {
            let literal = record.ip_address();
            if !addresses.contains(&literal) {
                addresses.push(literal);
            }
        }
        Ok(HostEntry {
            hostname: host.to_string(),
            family,
            addresses,
        })
    }

    async fn first(&self, query: AddressQuery) -> Result<AddressRecord, ResolveError> {
        let records = self.lookup(query).await?;
        records
            .into_iter()
            .next()
            .ok_or(ResolveError::AddressNotFound)
    }

    /// Offers a forward lookup to the hook. `None` means the blocking path
    /// must be used: no running fiber, no capable hook, or it declined.
    async fn delegate_address(
        &self,
        hostname: &str,
        timeout: Option<Duration>,
    ) -> Option<Vec<String>> {
        // The strong core reference must not live across the await: the core
        // owns this fiber's future, and holding it here would cycle.
        let (hook, token, reply) = {
            let core = self.core.upgrade()?;
            Core::register_waiter(&core, HookCapabilities::RESOLVE_ADDRESS)?
        };
        // The reply future is registered before the hook runs, so a
        // panicking hook still deregisters the waiter on unwind.
        let promise = AddressPromise::new(token, self.events.clone());
        hook.resolve_address(hostname, timeout, promise);
        match reply.await {
            HookReply::Addresses(addresses) => Some(addresses),
            _ => None,
        }
    }

    async fn delegate_name(&self, address: IpAddr) -> Option<String> {
        let (hook, token, reply) = {
            let core = self.core.upgrade()?;
            Core::register_waiter(&core, HookCapabilities::RESOLVE_NAME)?
        };
        let promise = NamePromise::new(token, self.events.clone());
        hook.resolve_name(address, promise);
        match reply.await {
            HookReply::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("scheduler_alive", &(self.core.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

/// Wildcard and broadcast host tokens of the classic API.
const ANY_HOST: &str = "<any>";
const BROADCAST_HOST: &str = "<broadcast>";

enum HostTarget {
    /// Addresses are already known; neither hook nor syscall is consulted.
    Literal(Vec<IpAddr>),
    /// A real name that needs resolution.
    Name(String),
}

fn host_target(query: &AddressQuery) -> HostTarget {
    match query.host.as_deref() {
        None => {
            let passive = query.flags.contains(AiFlags::PASSIVE);
            HostTarget::Literal(implicit_addresses(query.family, passive))
        }
        Some(ANY_HOST) => HostTarget::Literal(wildcard_addresses(query.family)),
        Some(BROADCAST_HOST) => HostTarget::Literal(vec![IpAddr::V4(Ipv4Addr::BROADCAST)]),
        Some(host) => match host.parse::<IpAddr>() {
            Ok(address) => HostTarget::Literal(vec![address]),
            Err(_) => HostTarget::Name(host.to_string()),
        },
    }
}

/// Addresses standing in for an absent host: loopback for active use,
/// wildcard when the query is for a listening socket. An unconstrained
/// family yields the IPv4 entry first.
fn implicit_addresses(family: Option<AddressFamily>, passive: bool) -> Vec<IpAddr> {
    if passive {
        wildcard_addresses(family)
    } else {
        loopback_addresses(family)
    }
}

fn loopback_addresses(family: Option<AddressFamily>) -> Vec<IpAddr> {
    match family {
        Some(AddressFamily::Inet) => vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        Some(AddressFamily::Inet6) => vec![IpAddr::V6(Ipv6Addr::LOCALHOST)],
        _ => vec![
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
        ],
    }
}

fn wildcard_addresses(family: Option<AddressFamily>) -> Vec<IpAddr> {
    match family {
        Some(AddressFamily::Inet) => vec![IpAddr::V4(Ipv4Addr::UNSPECIFIED)],
        Some(AddressFamily::Inet6) => vec![IpAddr::V6(Ipv6Addr::UNSPECIFIED)],
        _ => vec![
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        ],
    }
}

/// The loopback literal substituted for an absent reverse-lookup address.
fn family_loopback(family: AddressFamily) -> &'static str {
    match family {
        AddressFamily::Inet6 => "::1",
        _ => "127.0.0.1",
    }
}

/// Parses hook-provided literals, dropping entries that do not parse.
fn parse_hook_addresses(raw: Vec<String>) -> Vec<IpAddr> {
    let mut out = Vec::with_capacity(raw.len());
    for entry in raw {
        match entry.parse::<IpAddr>() {
            Ok(address) => out.push(address),
            Err(_) => {
                tracing::debug!(entry = %entry, "dropping unparseable address from hook");
            }
        }
    }
    out
}

/// Applies the family filter, stamps the port, and expands an unspecified
/// socket type into the Stream/Dgram pair per address.
fn expand_records(addresses: Vec<IpAddr>, query: &AddressQuery) -> Vec<AddressRecord> {
    const EXPANDED_TYPES: [SocketType; 2] = [SocketType::Stream, SocketType::Dgram];

    let mut records = Vec::new();
    for address in addresses {
        if let Some(family) = query.family {
            if AddressFamily::of(address) != family {
                continue;
            }
        }
        match query.socket_type {
            Some(socket_type) => {
                records.push(AddressRecord::new(address, query.port, socket_type));
            }
            None => {
                for socket_type in EXPANDED_TYPES {
                    records.push(AddressRecord::new(address, query.port, socket_type));
                }
            }
        }
    }
    records
}
