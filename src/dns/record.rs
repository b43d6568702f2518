use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Address family of a record, or a family constraint on a query.
///
/// `Unix` is accepted as a constraint but never produced by IP resolution,
/// so constraining an IP lookup to it yields no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Inet,
    Inet6,
    Unix,
}

impl AddressFamily {
    /// Family of a concrete IP address.
    pub fn of(address: IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressFamily::Inet => "AF_INET",
            AddressFamily::Inet6 => "AF_INET6",
            AddressFamily::Unix => "AF_UNIX",
        };
        f.write_str(name)
    }
}

/// Socket type of a record, or a type constraint on a query.
///
/// `Raw` is accepted as a constraint but never synthesized by the
/// unspecified-type expansion, which emits `Stream` and `Dgram` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    Stream,
    Dgram,
    Raw,
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketType::Stream => "SOCK_STREAM",
            SocketType::Dgram => "SOCK_DGRAM",
            SocketType::Raw => "SOCK_RAW",
        };
        f.write_str(name)
    }
}

/// Hint flags for forward (address) lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AiFlags(u8);

impl AiFlags {
    /// The query is for a listening socket: an absent host means the
    /// wildcard address instead of loopback.
    pub const PASSIVE: AiFlags = AiFlags(1 << 0);

    pub const fn empty() -> Self {
        AiFlags(0)
    }

    pub const fn contains(self, other: AiFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for AiFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        AiFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for AiFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Hint flags for reverse (name) lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NiFlags(u8);

impl NiFlags {
    /// Return the numeric form of the address without consulting anything.
    pub const NUMERIC_HOST: NiFlags = NiFlags(1 << 0);

    /// Fail instead of falling back to the numeric form when no name can
    /// be found.
    pub const NAME_REQUIRED: NiFlags = NiFlags(1 << 1);

    pub const fn empty() -> Self {
        NiFlags(0)
    }

    pub const fn contains(self, other: NiFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for NiFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        NiFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for NiFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One resolved address with family, port, and socket type filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    address: IpAddr,
    port: u16,
    family: AddressFamily,
    socket_type: SocketType,
}

impl AddressRecord {
    pub(crate) fn new(address: IpAddr, port: u16, socket_type: SocketType) -> Self {
        AddressRecord {
            address,
            port,
            family: AddressFamily::of(address),
            socket_type,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Printable address literal, e.g. `"127.0.0.1"` or `"::1"`.
    pub fn ip_address(&self) -> String {
        self.address.to_string()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    /// The record as a connectable socket address.
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.to_socket_addr(),
            self.family,
            self.socket_type
        )
    }
}

/// Result of a reverse lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    /// Resolved hostname, or the numeric literal when nothing resolved it.
    pub hostname: String,
    /// Service name for the queried port (`"http"` for 80), or the decimal
    /// port string for ports without a well-known name.
    pub service: String,
}

/// Result of a whole-host lookup, grouping every address under one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// The hostname exactly as queried.
    pub hostname: String,
    /// Family of the first resolved address.
    pub family: AddressFamily,
    /// Distinct address literals in resolution order.
    pub addresses: Vec<String>,
}

/// A forward lookup request under construction.
///
/// Every field is optional; an empty query resolves loopback on port 0.
///
/// ```rust,ignore
/// let query = AddressQuery::new()
///     .host("example.com")
///     .port(443)
///     .family(AddressFamily::Inet)
///     .socket_type(SocketType::Stream);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AddressQuery {
    pub(crate) host: Option<String>,
    pub(crate) port: u16,
    pub(crate) family: Option<AddressFamily>,
    pub(crate) socket_type: Option<SocketType>,
    pub(crate) flags: AiFlags,
    pub(crate) timeout: Option<Duration>,
}

impl AddressQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Keep only records of this family.
    pub fn family(mut self, family: AddressFamily) -> Self {
        self.family = Some(family);
        self
    }

    /// Emit records of this type only, instead of the Stream/Dgram pair.
    pub fn socket_type(mut self, socket_type: SocketType) -> Self {
        self.socket_type = Some(socket_type);
        self
    }

    pub fn flags(mut self, flags: AiFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Advisory deadline, forwarded to the resolver hook verbatim. The
    /// blocking fallback ignores it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
