//! Peripheral hardware abstraction layer
//!
//! The device registry, the communication interface set, and the
//! async/sync adapter. Concrete peripheral logic lives outside the crate
//! and plugs in through the [`Driver`](device::Driver) and
//! [`comm`] interfaces only.

pub mod adapter;
pub mod comm;
pub mod device;
pub mod registry;
