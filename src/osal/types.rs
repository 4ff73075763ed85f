//! Core type definitions for halos
//!
//! These types provide strong typing for the abstraction core.

/// Tick counter type
pub type Tick = u32;

/// Abstract priority: `[PRIO_MIN, PRIO_MAX]`, 0 is lowest
pub type Priority = u8;

/// Lowest abstract priority
pub const PRIO_MIN: Priority = 0;

/// Highest abstract priority
pub const PRIO_MAX: Priority = 31;

/// Nesting counter
pub type NestingCtr = u8;

/// Timeout for every blocking call in the core.
///
/// Millisecond values are converted to ticks by rounding up, so a bounded
/// wait never expires early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Try exactly once, never block
    None,
    /// Block up to this many milliseconds
    Ms(u32),
    /// Block indefinitely
    Forever,
}

/// Resolved wait limit on the monotonic tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Single attempt, no blocking
    Poll,
    /// Expires when the tick counter reaches this value
    At(Tick),
    /// Never expires
    Never,
}

/// Event-flags wait mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WaitMode {
    /// Satisfied when any bit of the mask is set
    Any = 0,
    /// Satisfied only when all bits of the mask are set
    All = 1,
}
