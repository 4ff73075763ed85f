//! Synchronization primitives
//!
//! One contract, two scheduler backends: each primitive checks its
//! predicate and queues a waiter under a critical section, then blocks
//! through the installed [`Scheduler`](crate::osal::sched::Scheduler).

pub mod wait;

#[cfg(feature = "sem")]
pub mod sem;

#[cfg(feature = "mutex")]
pub mod mutex;

#[cfg(feature = "queue")]
pub mod queue;

#[cfg(feature = "flags")]
pub mod flags;
