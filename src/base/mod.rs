//! Base types and error handling.
//!
//! Provides the error surface shared by the scheduler and the resolution
//! facade:
//! - [`ResolveError`]: resolution failures carrying the classic resolver
//!   diagnostics verbatim
//! - [`JoinError`]: why a fiber produced no value
//!
//! [`ResolveError`]: error::ResolveError
//! [`JoinError`]: error::JoinError

pub mod error;
