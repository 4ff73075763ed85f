//! halos: hardware and OS abstraction layer
//!
//! A portable abstraction core for embedded applications:
//! - Synchronization primitives with one contract over cooperative and
//!   preemptive scheduler backends
//! - Reference-counted device registry with lazy activation
//! - Async/sync communication adapters
//! - Shared-resource managers (DMA channels, interrupt slots)

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod osal;
pub mod sync;
pub mod hal;
pub mod resource;

// ============ Re-exports ============

pub use osal::config;
pub use osal::config::*;
pub use osal::critical;
pub use osal::error;
pub use osal::error::{Error, Result};
pub use osal::sched;
pub use osal::sched::{CoopScheduler, Scheduler};
pub use osal::tick;
pub use osal::types;
pub use osal::types::*;

pub use sync::wait::WaitNode;

#[cfg(feature = "sem")]
pub use sync::sem::Semaphore;
#[cfg(feature = "mutex")]
pub use sync::mutex::Mutex;
#[cfg(feature = "queue")]
pub use sync::queue::Queue;
#[cfg(feature = "flags")]
pub use sync::flags::EventFlags;

pub use hal::adapter::{Adapter, AdapterPool};
pub use hal::comm::{BlockingComm, NonBlockingComm};
pub use hal::device::{Descriptor, DeviceConfig, DeviceHandle, DeviceState, Driver};
pub use hal::registry;
pub use hal::registry::Registry;

pub use resource::dma::{ChannelState, DmaChannel, DmaController, DmaTransfer};
pub use resource::irq::IrqTable;
