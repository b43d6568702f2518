//! Resolver Hook Contract
//!
//! A hook receives the lookups that would otherwise block the carrier
//! thread. Each request carries a single-shot promise; the hook fulfills it
//! with results, declines it, or just drops it (dropping declines). A
//! declined request falls back to the blocking system resolver; fulfilling
//! with an *empty* result instead fails the lookup outright.
//!
//! Hooks run on the carrier thread and must return quickly. The promises
//! are `Send`, so the actual work can happen anywhere and complete the
//! promise from a foreign thread.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::fiber::{LoopEvent, ResumeToken};

/// What a hook answered. Routed back to the waiting fiber through the
/// scheduler mailbox.
#[derive(Debug)]
pub(crate) enum HookReply {
    /// Address literals for a forward request, in hook order.
    Addresses(Vec<String>),
    /// Hostname for a reverse request.
    Name(String),
    /// The hook opted out; the caller takes the blocking path.
    Declined,
}

/// Which request kinds a hook takes over.
///
/// Probed once when the hook is installed and cached by the scheduler;
/// requests outside the advertised set never reach the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookCapabilities(u8);

impl HookCapabilities {
    /// The hook handles forward (hostname to addresses) resolution.
    pub const RESOLVE_ADDRESS: HookCapabilities = HookCapabilities(1 << 0);

    /// The hook handles reverse (address to hostname) resolution.
    pub const RESOLVE_NAME: HookCapabilities = HookCapabilities(1 << 1);

    pub const fn empty() -> Self {
        HookCapabilities(0)
    }

    pub const fn all() -> Self {
        HookCapabilities(Self::RESOLVE_ADDRESS.0 | Self::RESOLVE_NAME.0)
    }

    pub const fn contains(self, other: HookCapabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for HookCapabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        HookCapabilities(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for HookCapabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for HookCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (bit, name) in [
            (Self::RESOLVE_ADDRESS, "RESOLVE_ADDRESS"),
            (Self::RESOLVE_NAME, "RESOLVE_NAME"),
        ] {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Shared body of the two promise kinds: the resume token plus the mailbox
/// it reports into. Declines on drop unless a reply was already sent.
struct PromiseInner {
    token: ResumeToken,
    events: Sender<LoopEvent>,
    completed: bool,
}

impl PromiseInner {
    fn send(&mut self, reply: HookReply) {
        self.completed = true;
        // The scheduler may already be gone; an undeliverable reply is fine.
        let _ = self.events.send(LoopEvent::Resumed {
            token: self.token,
            reply,
        });
    }
}

impl Drop for PromiseInner {
    fn drop(&mut self) {
        if !self.completed {
            self.send(HookReply::Declined);
        }
    }
}

/// Single-shot reply slot for one forward request.
///
/// Consuming it fulfills or declines the request; dropping it unfulfilled
/// declines. May be moved to and completed from any thread.
pub struct AddressPromise {
    inner: PromiseInner,
}

impl AddressPromise {
    pub(crate) fn new(token: ResumeToken, events: Sender<LoopEvent>) -> Self {
        AddressPromise {
            inner: PromiseInner {
                token,
                events,
                completed: false,
            },
        }
    }

    /// Answers with address literals in preference order.
    ///
    /// An empty list is a real answer ("this name has no addresses") and
    /// fails the lookup; to fall back to the blocking resolver, decline
    /// instead.
    pub fn fulfill(mut self, addresses: Vec<String>) {
        self.inner.send(HookReply::Addresses(addresses));
    }

    /// Opts out; the request falls back to the blocking path.
    pub fn decline(mut self) {
        self.inner.send(HookReply::Declined);
    }
}

impl fmt::Debug for AddressPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressPromise")
            .field("token", &self.inner.token)
            .finish_non_exhaustive()
    }
}

/// Single-shot reply slot for one reverse request.
pub struct NamePromise {
    inner: PromiseInner,
}

impl NamePromise {
    pub(crate) fn new(token: ResumeToken, events: Sender<LoopEvent>) -> Self {
        NamePromise {
            inner: PromiseInner {
                token,
                events,
                completed: false,
            },
        }
    }

    /// Answers with the resolved hostname.
    pub fn fulfill(mut self, hostname: impl Into<String>) {
        self.inner.send(HookReply::Name(hostname.into()));
    }

    /// Opts out; the request falls back to the blocking path.
    pub fn decline(mut self) {
        self.inner.send(HookReply::Declined);
    }
}

impl fmt::Debug for NamePromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamePromise")
            .field("token", &self.inner.token)
            .finish_non_exhaustive()
    }
}

/// A scheduler hook that takes over address resolution.
///
/// Implementations advertise what they handle via
/// [`capabilities`](Self::capabilities) and receive one promise per
/// request. Hooks are invoked on the carrier thread and must not block it:
/// hand the promise to whatever does the real work and return.
///
/// The default method bodies drop the promise, declining every request, so
/// an implementation only overrides what it advertises.
pub trait ResolveHook: Send + Sync {
    /// Which request kinds this hook takes. Probed once at installation.
    fn capabilities(&self) -> HookCapabilities;

    /// Resolve `hostname` to address literals.
    ///
    /// `timeout` is the caller's advisory deadline, forwarded verbatim;
    /// hooks are free to ignore it.
    fn resolve_address(&self, hostname: &str, timeout: Option<Duration>, promise: AddressPromise) {
        let _ = (hostname, timeout);
        drop(promise);
    }

    /// Resolve `address` back to a hostname.
    fn resolve_name(&self, address: IpAddr, promise: NamePromise) {
        let _ = address;
        drop(promise);
    }
}
