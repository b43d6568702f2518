//! Blocking Resolution Fallbacks
//!
//! The syscall path used when no hook is installed, the hook lacks the
//! capability, or the hook declines a request. Forward lookups go through
//! the system resolver (`getaddrinfo` via the standard library); reverse
//! lookups call `getnameinfo` directly.
//!
//! Everything here blocks the carrier thread. That is the behavior hooks
//! exist to replace, and it is also the contract: with no hook in play, the
//! operations behave exactly like their syscall namesakes.

use std::net::{IpAddr, ToSocketAddrs};

use crate::base::error::ResolveError;

/// Resolves `host` with the blocking system resolver.
///
/// Returns distinct addresses in resolver order. Every resolver failure
/// maps to [`ResolveError::AddressNotFound`].
pub(crate) fn resolve_host(host: &str) -> Result<Vec<IpAddr>, ResolveError> {
    tracing::debug!(host = %host, "resolving via blocking getaddrinfo");
    let addrs = (host, 0u16).to_socket_addrs().map_err(|error| {
        tracing::debug!(host = %host, error = %error, "blocking getaddrinfo failed");
        ResolveError::AddressNotFound
    })?;

    let mut out = Vec::new();
    for addr in addrs {
        let ip = addr.ip();
        if !out.contains(&ip) {
            out.push(ip);
        }
    }
    Ok(out)
}

/// Reverse-resolves `address` to a hostname, if the system knows one.
///
/// Loopback addresses short-circuit to `"localhost"` without a syscall.
/// `None` means no name exists (or reverse lookup is unsupported on this
/// platform); the caller decides whether that is an error.
pub(crate) fn resolve_addr(address: IpAddr) -> Option<String> {
    if address.is_loopback() {
        return Some("localhost".to_string());
    }
    lookup_name(address)
}

#[cfg(unix)]
fn lookup_name(address: IpAddr) -> Option<String> {
    use std::ffi::CStr;
    use std::net::SocketAddr;

    // NI_MAXHOST from getnameinfo(3).
    const MAX_HOST: usize = 1025;

    tracing::debug!(address = %address, "reverse resolving via blocking getnameinfo");
    let sockaddr = socket2::SockAddr::from(SocketAddr::new(address, 0));
    let mut host = [0 as libc::c_char; MAX_HOST];
    // SAFETY: the sockaddr pointer and length describe a live SockAddr, and
    // the host buffer is writable for MAX_HOST bytes.
    let rc = unsafe {
        libc::getnameinfo(
            sockaddr.as_ptr() as *const libc::sockaddr,
            sockaddr.len(),
            host.as_mut_ptr(),
            MAX_HOST as libc::socklen_t,
            std::ptr::null_mut(),
            0,
            libc::NI_NAMEREQD,
        )
    };
    if rc != 0 {
        tracing::debug!(address = %address, code = rc, "blocking getnameinfo found no name");
        return None;
    }

    // SAFETY: a zero return guarantees a NUL-terminated string in `host`.
    let name = unsafe { CStr::from_ptr(host.as_ptr()) };
    name.to_str().ok().map(str::to_string)
}

#[cfg(not(unix))]
fn lookup_name(_address: IpAddr) -> Option<String> {
    None
}
