//! # fibernet
//!
//! A cooperative fiber scheduler with hookable address resolution.
//!
//! `fibernet` runs many fibers on one carrier thread and lets a pluggable
//! resolver hook take over DNS lookups that would otherwise block the whole
//! thread. While one fiber waits for an answer, the scheduler keeps running
//! the others; when no hook is installed (or the hook declines a request),
//! lookups fall back to the ordinary blocking system calls.
//!
//! ## Features
//!
//! - **Cooperative Scheduling**: many fibers, one carrier thread, no locks
//! - **Pluggable Resolution**: forward and reverse lookups routed to a hook
//! - **Blocking Fallback**: `getaddrinfo`/`getnameinfo` when no hook answers
//! - **Numeric Fast Path**: address literals never touch hook or syscall
//! - **Panic Isolation**: a panicking fiber never takes its siblings down
//! - **Async Backend**: a ready-made hook built on hickory-dns
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fibernet::dns::{AddressFamily, SocketType, StaticHook};
//! use fibernet::fiber::FiberScheduler;
//! use std::sync::Arc;
//!
//! fn main() {
//!     let hook = StaticHook::new().host("example.com", ["93.184.216.34"]);
//!     let mut scheduler = FiberScheduler::with_hook(Arc::new(hook));
//!     let resolver = scheduler.resolver();
//!     let handle = scheduler.schedule(async move {
//!         resolver
//!             .getaddrinfo(Some("example.com"), 80, Some(AddressFamily::Inet), Some(SocketType::Stream))
//!             .await
//!     });
//!     scheduler.run();
//!     println!("{:?}", handle.join());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core error definitions
//! - [`dns`] - Resolution facade, resolver hooks, and blocking fallbacks
//! - [`fiber`] - The cooperative scheduler and fiber handles

pub mod base;
pub mod dns;
pub mod fiber;
