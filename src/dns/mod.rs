//! Address Resolution Module
//!
//! Forward and reverse resolution with a pluggable scheduler hook and a
//! blocking-syscall fallback:
//! - [`Resolver`]: the facade fibers call (`getaddrinfo`, `getnameinfo`,
//!   and the by-protocol helpers)
//! - [`ResolveHook`]: the contract a hook implements to take lookups over
//! - [`StaticHook`]: fixed-table hook for tests and pinned hosts
//! - [`HickoryHook`]: async hook backed by hickory-dns
//!
//! # Architecture
//!
//! The facade decides per request whether delegation is possible: there
//! must be a running fiber, an installed hook, and the matching capability.
//! Delegated requests suspend the calling fiber and hand the hook a
//! single-shot promise; everything else, declined requests included, takes
//! the blocking path. Numeric literals and the wildcard/broadcast tokens
//! short-circuit inside the facade and reach neither.
//!
//! # Example
//!
//! ```rust,ignore
//! use fibernet::dns::{AddressFamily, SocketType};
//! use fibernet::fiber::FiberScheduler;
//!
//! let mut scheduler = FiberScheduler::new();
//! let resolver = scheduler.resolver();
//! let handle = scheduler.schedule(async move {
//!     resolver
//!         .getaddrinfo(Some("localhost"), 80, Some(AddressFamily::Inet), Some(SocketType::Stream))
//!         .await
//! });
//! scheduler.run();
//! let records = handle.join().unwrap().unwrap();
//! assert_eq!(records[0].ip_address(), "127.0.0.1");
//! ```

mod fallback;
mod hickory;
mod hook;
mod hosts;
mod record;
mod resolver;
mod service;

pub use hickory::HickoryHook;
pub use hook::{AddressPromise, HookCapabilities, NamePromise, ResolveHook};
pub use hosts::StaticHook;
pub use record::{
    AddressFamily, AddressQuery, AddressRecord, AiFlags, HostEntry, NameRecord, NiFlags,
    SocketType,
};
pub use resolver::Resolver;

pub(crate) use hook::HookReply;
