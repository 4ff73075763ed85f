//! Error types for halos
//!
//! Every operation in the core returns `Result<T>`; the variants below are
//! the complete result-code set shared by the registry, the primitives, the
//! adapters, and the resource managers.
//!
//! Taxonomy:
//! - resource exhaustion (`OutOfMemory`, `Full`, `Empty`): recoverable by
//!   the caller, never retried internally
//! - contract violations (`NullRef`, `InvalidParam`, `InvalidState`,
//!   `NotInit`, `AlreadyInit`): checked before any backend interaction
//! - transient conditions (`Timeout`, `Busy`): the caller may retry
//! - context violations (`IsrContext`): rejected outright, never converted
//!   to non-blocking behavior

/// Core error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Error {
    /// Null or dangling reference where a valid one is required
    NullRef = 1,
    /// Invalid parameter (bad count, mask, size, or width)
    InvalidParam = 2,
    /// Resource is temporarily unavailable
    Busy = 3,
    /// Operation timed out, or a try-once attempt found nothing to take
    Timeout = 4,
    /// A fixed pool or table has no free slot
    OutOfMemory = 5,
    /// Object has not been created/initialized
    NotInit = 6,
    /// Object is already created/initialized
    AlreadyInit = 7,
    /// Blocking operation attempted from interrupt context
    IsrContext = 8,
    /// Operation is invalid in the object's current state
    InvalidState = 9,
    /// Operation is not supported by this object
    NotSupported = 10,
    /// No object with the given name or index
    NotFound = 11,
    /// Counter or container is at capacity
    Full = 12,
    /// Container has no data
    Empty = 13,
}

/// Result type alias for core operations
pub type Result<T> = core::result::Result<T, Error>;
