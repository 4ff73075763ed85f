//! OS abstraction layer
//!
//! Contains the error set, timeout and tick handling, critical sections,
//! and the scheduler backend contract.

pub mod config;
pub mod critical;
pub mod cs_cell;
pub mod error;
pub mod sched;
pub mod tick;
pub mod types;
