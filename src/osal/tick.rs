//! Monotonic tick source and timeout conversion
//!
//! A single process-wide tick counter drives every timeout in the core.
//! On a hardware target the SysTick handler advances it; a cooperative
//! main loop or a test harness can advance it explicitly.

use portable_atomic::{AtomicU32, Ordering};

use crate::osal::config::CFG_TICK_RATE_HZ;
use crate::osal::critical;
use crate::osal::types::{Deadline, Tick, Timeout};

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Current tick count
#[inline]
pub fn now() -> Tick {
    TICKS.load(Ordering::Relaxed)
}

/// Advance the tick counter, returning the new value
#[inline]
pub fn advance(ticks: Tick) -> Tick {
    TICKS.fetch_add(ticks, Ordering::Relaxed).wrapping_add(ticks)
}

/// Tick interrupt body: advances time inside ISR context
pub fn handler() {
    critical::isr_enter();
    advance(1);
    critical::isr_exit();
}

/// SysTick interrupt handler
#[cfg(target_arch = "arm")]
#[no_mangle]
pub extern "C" fn SysTick() {
    handler();
}

/// Convert milliseconds to ticks, rounding up.
///
/// Rounding is always upward so a bounded timeout can never expire before
/// the requested duration (1 ms at a 1000 Hz tick is 1 tick, never 0).
/// Saturates at `Tick::MAX`.
pub fn ms_to_ticks(ms: u32) -> Tick {
    let ticks = (ms as u64 * CFG_TICK_RATE_HZ as u64 + 999) / 1000;
    ticks.min(Tick::MAX as u64) as Tick
}

/// Resolve a timeout against the current tick
pub fn deadline_of(timeout: Timeout) -> Deadline {
    match timeout {
        Timeout::None => Deadline::Poll,
        Timeout::Ms(ms) => Deadline::At(now().wrapping_add(ms_to_ticks(ms))),
        Timeout::Forever => Deadline::Never,
    }
}

/// Check whether the tick counter has reached `tick`, wraparound-safe
#[inline]
pub fn reached(tick: Tick) -> bool {
    now().wrapping_sub(tick) as i32 >= 0
}

/// Check whether a resolved deadline has expired.
///
/// `Poll` deadlines count as expired: the single allowed attempt has
/// already been made by the time this is asked.
#[inline]
pub fn expired(deadline: Deadline) -> bool {
    match deadline {
        Deadline::Poll => true,
        Deadline::At(tick) => reached(tick),
        Deadline::Never => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_conversion_rounds_up() {
        // 1000 Hz tick: 1 ms is exactly 1 tick
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1), 1);
        assert_eq!(ms_to_ticks(2), 2);
        assert_eq!(ms_to_ticks(1000), 1000);
    }

    #[test]
    fn test_ms_conversion_saturates() {
        assert_eq!(ms_to_ticks(u32::MAX), u32::MAX);
    }

    #[test]
    fn test_deadline_kinds() {
        assert_eq!(deadline_of(Timeout::None), Deadline::Poll);
        assert_eq!(deadline_of(Timeout::Forever), Deadline::Never);
        assert!(matches!(deadline_of(Timeout::Ms(5)), Deadline::At(_)));
    }

    #[test]
    fn test_expiry() {
        assert!(expired(Deadline::Poll));
        assert!(!expired(Deadline::Never));
        let soon = now().wrapping_add(1000);
        assert!(!expired(Deadline::At(soon)));
        assert!(expired(Deadline::At(now())));
    }
}
