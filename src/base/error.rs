use thiserror::Error;

/// Failure of an address or name resolution request.
///
/// The display strings reproduce the classic resolver diagnostics exactly;
/// callers and tests match on them, so they must never be reworded.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ResolveError {
    // Forward resolution (hostname to addresses)
    #[error("getaddrinfo: nodename nor servname provided, or not known")]
    AddressNotFound,

    // Reverse resolution (address to hostname)
    #[error("getnameinfo: nodename nor servname provided, or not known")]
    NameNotFound,
}

/// Why joining a fiber produced no value.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum JoinError {
    /// The fiber body panicked; the payload message is preserved.
    #[error("fiber panicked: {0}")]
    Panicked(String),

    /// The fiber has not finished (the scheduler has not run it to
    /// completion, or was dropped before it could).
    #[error("fiber has not completed")]
    Incomplete,
}
