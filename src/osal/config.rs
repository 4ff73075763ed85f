//! Compile-time configuration for halos
//!
//! These constants control the resource limits of the abstraction core.
//! Instance counts and buffer sizes are fixed at build time; there is no
//! dynamic allocation in any core path.

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Number of entries in the device registry table
pub const CFG_DEVICE_MAX: usize = 16;

/// Maximum reference count per device
pub const CFG_DEVICE_REF_MAX: u8 = 15;

/// Number of adapter objects in the fixed pool
pub const CFG_ADAPTER_POOL_SIZE: usize = 4;

/// Staging buffer size of a non-blocking adapter, in bytes
pub const CFG_ADAPTER_BUF_SIZE: usize = 64;

/// Number of DMA channels per controller
pub const CFG_DMA_CHANNEL_MAX: usize = 8;

/// Number of interrupt slots per table
pub const CFG_IRQ_SLOT_MAX: usize = 16;
