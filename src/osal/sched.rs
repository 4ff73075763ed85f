//! Scheduler backend contract
//!
//! The core never schedules anything itself; every blocking primitive is
//! written against the [`Scheduler`] trait, the single boundary to the one
//! concrete backend linked into an application. Two models satisfy it:
//!
//! - cooperative: one logical context, "blocking" spins and yields until a
//!   condition holds or a deadline passes ([`CoopScheduler`], shipped here)
//! - preemptive: the backend suspends the calling context on `wait` and
//!   performs a real context switch; waiter release order is handled by the
//!   primitives' wait lists (priority, then arrival)
//!
//! The backend is installed once at composition time; blocking calls before
//! installation fail with `NotInit`.

use crate::osal::critical::critical_section;
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};
use crate::osal::types::{Deadline, Priority, PRIO_MAX, PRIO_MIN};
use crate::sync::wait::WaitNode;

/// Scheduler backend contract.
///
/// `notify` may be called from inside a critical section or from ISR
/// context and must never block.
pub trait Scheduler: Sync {
    /// Identifier of the calling execution context
    fn current_id(&self) -> usize;

    /// Abstract priority of the calling context, `[0, 31]` with 0 lowest
    fn current_priority(&self) -> Priority;

    /// Block the calling context until `node` is signaled or `deadline`
    /// passes. May return spuriously; callers re-check their predicate.
    fn wait(&self, node: &WaitNode, deadline: Deadline);

    /// Make the context owning `node` runnable again
    fn notify(&self, node: &WaitNode);

    /// Give up the processor so other work can run
    fn yield_now(&self);
}

// ============ Installation ============

static SCHEDULER: CsCell<Option<&'static dyn Scheduler>> = CsCell::new(None);

/// Install the scheduler backend. Done once at composition time, before the
/// first blocking call.
pub fn install(sched: &'static dyn Scheduler) -> Result<()> {
    critical_section(|cs| {
        let slot = SCHEDULER.get(cs);
        if slot.is_some() {
            return Err(Error::AlreadyInit);
        }
        *slot = Some(sched);
        Ok(())
    })
}

/// The installed backend, or `NotInit` before installation
pub fn current() -> Result<&'static dyn Scheduler> {
    critical_section(|cs| *SCHEDULER.get(cs)).ok_or(Error::NotInit)
}

/// Identifier of the calling context (0 before installation)
pub(crate) fn current_id() -> usize {
    current().map(|s| s.current_id()).unwrap_or(0)
}

/// Priority of the calling context (lowest before installation)
pub(crate) fn current_priority() -> Priority {
    current().map(|s| s.current_priority()).unwrap_or(PRIO_MIN)
}

/// Signal a popped waiter through the backend
pub(crate) fn notify(node: &WaitNode) {
    match current() {
        Ok(sched) => sched.notify(node),
        Err(_) => node.signal(),
    }
}

/// Best-effort yield: backend yield if installed, busy-spin hint otherwise
pub(crate) fn yield_now() {
    match current() {
        Ok(sched) => sched.yield_now(),
        Err(_) => core::hint::spin_loop(),
    }
}

// ============ Priority mapping ============

/// Map an abstract priority onto a backend's native range `[0, levels-1]`.
///
/// The mapping is monotonic with exact boundaries: 0 maps to 0 and
/// [`PRIO_MAX`] maps to `levels - 1`.
pub fn map_priority(prio: Priority, levels: u32) -> Result<u32> {
    if levels == 0 || prio > PRIO_MAX {
        return Err(Error::InvalidParam);
    }
    Ok(prio as u32 * (levels - 1) / PRIO_MAX as u32)
}

// ============ Cooperative backend ============

/// Cooperative scheduler: one logical context, blocking is spin-and-yield.
///
/// The idle hook runs once per wait/yield step and is where a bare-metal
/// main loop drains interrupt work or sleeps; it is injected explicitly at
/// construction time.
pub struct CoopScheduler {
    idle_hook: Option<fn()>,
}

impl CoopScheduler {
    pub const fn new() -> Self {
        Self { idle_hook: None }
    }

    pub const fn with_idle_hook(hook: fn()) -> Self {
        Self { idle_hook: Some(hook) }
    }
}

impl Default for CoopScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for CoopScheduler {
    fn current_id(&self) -> usize {
        0
    }

    fn current_priority(&self) -> Priority {
        PRIO_MIN
    }

    fn wait(&self, node: &WaitNode, _deadline: Deadline) {
        // One bounded step; the primitive's loop re-checks the predicate
        // and the deadline between steps.
        if !node.is_signaled() {
            self.yield_now();
        }
    }

    fn notify(&self, node: &WaitNode) {
        node.signal();
    }

    fn yield_now(&self) {
        match self.idle_hook {
            Some(hook) => hook(),
            None => core::hint::spin_loop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_boundaries() {
        // map(0) = 0 and map(31) = N-1 for any native range
        for levels in [1u32, 2, 4, 8, 32, 64, 256] {
            assert_eq!(map_priority(0, levels).unwrap(), 0);
            assert_eq!(map_priority(PRIO_MAX, levels).unwrap(), levels - 1);
        }
    }

    #[test]
    fn test_map_monotonic() {
        for levels in [2u32, 7, 16, 100] {
            let mut last = 0;
            for prio in 0..=PRIO_MAX {
                let mapped = map_priority(prio, levels).unwrap();
                assert!(mapped >= last);
                assert!(mapped < levels);
                last = mapped;
            }
        }
    }

    #[test]
    fn test_map_rejects_bad_input() {
        assert_eq!(map_priority(0, 0), Err(Error::InvalidParam));
        assert_eq!(map_priority(32, 8), Err(Error::InvalidParam));
    }
}
