//! Critical section and interrupt-context handling
//!
//! Wraps the `critical-section` backend with a closure API, a nesting
//! entry/exit pair that only re-enables interrupts once the depth returns
//! to zero, and interrupt-context tracking so blocking calls can be
//! rejected from ISRs.

use core::cell::UnsafeCell;

use ::critical_section::RestoreState;
use portable_atomic::{AtomicU8, AtomicU32, Ordering};

pub use ::critical_section::CriticalSection;

/// Execute a closure with interrupts disabled
///
/// The closure receives a critical-section token which can be used to
/// access [`CsCell`](crate::osal::cs_cell::CsCell) protected data.
#[inline]
pub fn critical_section<R>(f: impl FnOnce(CriticalSection<'_>) -> R) -> R {
    ::critical_section::with(f)
}

// ============ Nested entry/exit ============

/// Depth of manually nested critical sections
static CS_NESTING: AtomicU32 = AtomicU32::new(0);

struct Saved(UnsafeCell<RestoreState>);

// Only written while interrupts are disabled on a single core.
unsafe impl Sync for Saved {}

static CS_RESTORE: Saved = Saved(UnsafeCell::new(RestoreState::invalid()));

/// Enter a critical section, nesting-aware.
///
/// The first entry disables interrupts; further entries only increment the
/// depth counter. Each `enter` must be paired with one [`exit`].
pub fn enter() {
    if CS_NESTING.load(Ordering::Relaxed) == 0 {
        let state = unsafe { ::critical_section::acquire() };
        unsafe { CS_RESTORE.0.get().write(state) };
    }
    CS_NESTING.fetch_add(1, Ordering::Relaxed);
}

/// Leave a critical section entered with [`enter`].
///
/// Interrupts are restored only when the depth returns to zero. An `exit`
/// without a matching `enter` returns `InvalidState`.
pub fn exit() -> crate::osal::error::Result<()> {
    let depth = CS_NESTING.load(Ordering::Relaxed);
    if depth == 0 {
        return Err(crate::osal::error::Error::InvalidState);
    }
    CS_NESTING.store(depth - 1, Ordering::Relaxed);
    if depth == 1 {
        let state = unsafe { CS_RESTORE.0.get().read() };
        unsafe { ::critical_section::release(state) };
    }
    Ok(())
}

/// Current nesting depth of [`enter`]/[`exit`] pairs
#[inline]
pub fn depth() -> u32 {
    CS_NESTING.load(Ordering::Relaxed)
}

// ============ Interrupt context ============

/// Software interrupt nesting counter, incremented by dispatch entry points
static ISR_NESTING: AtomicU8 = AtomicU8::new(0);

/// Enter ISR context (called by interrupt dispatch entry points)
#[inline]
pub fn isr_enter() {
    let nesting = ISR_NESTING.load(Ordering::Relaxed);
    if nesting < u8::MAX {
        ISR_NESTING.store(nesting + 1, Ordering::Relaxed);
    }
}

/// Leave ISR context
#[inline]
pub fn isr_exit() {
    let nesting = ISR_NESTING.load(Ordering::Relaxed);
    if nesting > 0 {
        ISR_NESTING.store(nesting - 1, Ordering::Relaxed);
    }
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    if ISR_NESTING.load(Ordering::Relaxed) > 0 {
        return true;
    }

    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}
