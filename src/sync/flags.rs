//! Event flags
//!
//! 32 independent bits per group. `set` and `clear` are atomic multi-bit
//! updates that never disturb bits outside the mask; `wait` supports ANY
//! and ALL modes with optional consumption of the satisfying bits.

use core::ptr::NonNull;

use crate::osal::critical::{critical_section, is_isr_context};
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};
use crate::osal::sched;
use crate::osal::tick;
use crate::osal::types::{Deadline, Timeout, WaitMode};
use crate::sync::wait::{WaitList, WaitNode};

struct FlagsInner {
    created: bool,
    bits: u32,
    waiters: WaitList,
    #[cfg(feature = "defmt")]
    name: &'static str,
}

/// Group of 32 event flags
pub struct EventFlags {
    inner: CsCell<FlagsInner>,
}

unsafe impl Sync for EventFlags {}
unsafe impl Send for EventFlags {}

impl EventFlags {
    pub const fn new() -> Self {
        Self {
            inner: CsCell::new(FlagsInner {
                created: false,
                bits: 0,
                waiters: WaitList::new(),
                #[cfg(feature = "defmt")]
                name: "",
            }),
        }
    }

    /// Initialize the flag group with all bits clear
    pub fn create(&self, _name: &'static str) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }

        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if inner.created {
                return Err(Error::AlreadyInit);
            }
            inner.created = true;
            inner.bits = 0;
            inner.waiters = WaitList::new();
            #[cfg(feature = "defmt")]
            {
                inner.name = _name;
            }
            Ok(())
        })
    }

    /// Set the bits in `mask`, waking every waiter to re-check its condition
    pub fn set(&self, mask: u32) -> Result<u32> {
        if mask == 0 {
            return Err(Error::InvalidParam);
        }
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            inner.bits |= mask;
            while let Some(waiter) = inner.waiters.pop_first(cs) {
                sched::notify(unsafe { waiter.as_ref() });
            }
            Ok(inner.bits)
        })
    }

    /// ISR-safe set; never blocks
    #[inline]
    pub fn set_from_isr(&self, mask: u32) -> Result<u32> {
        self.set(mask)
    }

    /// Clear the bits in `mask`, leaving all others untouched
    pub fn clear(&self, mask: u32) -> Result<u32> {
        if mask == 0 {
            return Err(Error::InvalidParam);
        }
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            inner.bits &= !mask;
            Ok(inner.bits)
        })
    }

    /// Current flag value; non-blocking, non-mutating
    pub fn get(&self) -> Result<u32> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            Ok(inner.bits)
        })
    }

    /// Wait for `mask` under `mode`, blocking up to `timeout`.
    ///
    /// Returns the satisfying bits immediately if the condition already
    /// holds. With `auto_clear` the satisfying bits are consumed atomically
    /// with the check; other bits are never disturbed.
    pub fn wait(
        &self,
        mask: u32,
        mode: WaitMode,
        auto_clear: bool,
        timeout: Timeout,
    ) -> Result<u32> {
        if mask == 0 {
            return Err(Error::InvalidParam);
        }
        if is_isr_context() {
            return Err(Error::IsrContext);
        }

        let deadline = tick::deadline_of(timeout);
        let sched = match deadline {
            Deadline::Poll => None,
            _ => Some(sched::current()?),
        };
        let node = WaitNode::new(sched::current_priority());
        let node_ptr = NonNull::from(&node);

        loop {
            let done = critical_section(|cs| {
                let inner = self.inner.get(cs);
                if !inner.created {
                    return Some(Err(Error::NotInit));
                }
                let hit = inner.bits & mask;
                let satisfied = match mode {
                    WaitMode::Any => hit != 0,
                    WaitMode::All => hit == mask,
                };
                if satisfied {
                    if auto_clear {
                        inner.bits &= !hit;
                    }
                    if node.is_queued(cs) {
                        inner.waiters.remove(cs, node_ptr);
                    }
                    return Some(Ok(hit));
                }
                if tick::expired(deadline) {
                    if node.is_queued(cs) {
                        inner.waiters.remove(cs, node_ptr);
                    }
                    return Some(Err(Error::Timeout));
                }
                if !node.is_queued(cs) {
                    node.reset_signal();
                    inner.waiters.insert(cs, node_ptr);
                }
                None
            });

            match done {
                Some(result) => return result,
                None => match sched {
                    Some(s) => s.wait(&node, deadline),
                    None => return Err(Error::Timeout),
                },
            }
        }
    }

    /// Tear the group down. Deleting with active waiters is rejected with
    /// `Busy`.
    pub fn delete(&self) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            if !inner.waiters.is_empty() {
                return Err(Error::Busy);
            }
            inner.created = false;
            inner.bits = 0;
            Ok(())
        })
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}
