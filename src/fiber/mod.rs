//! Cooperative Fiber Scheduling
//!
//! Runs many fibers on a single carrier thread. A fiber is a plain
//! `'static` future; the scheduler polls exactly one at a time, and a fiber
//! keeps the thread until it suspends or finishes. Suspension happens at
//! resolution delegation points (see [`crate::dns`]) or wherever a future
//! parks itself with a waker.
//!
//! # Architecture
//!
//! The scheduler owns a ready queue and a table of fibers waiting on
//! resolver replies, plus an event mailbox fed by wakers and hooks. Hooks
//! may complete requests from foreign threads; the mailbox is the only
//! thread-safe seam, so the scheduler itself needs no locks.
//!
//! Completion order follows suspension, not schedule order: a fiber that
//! delegates a lookup steps aside, and fibers scheduled after it may finish
//! first.
//!
//! # Example
//!
//! ```rust,ignore
//! use fibernet::fiber::FiberScheduler;
//!
//! let mut scheduler = FiberScheduler::new();
//! let handle = scheduler.schedule(async { 2 + 2 });
//! scheduler.run();
//! assert_eq!(handle.join().unwrap(), 4);
//! ```

mod handle;
mod scheduler;

pub use handle::FiberHandle;
pub use scheduler::{FiberId, FiberScheduler, FiberState, Spawner};

pub(crate) use scheduler::{Core, LoopEvent, ResumeToken};
