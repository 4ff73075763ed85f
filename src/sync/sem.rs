//! Semaphore implementation
//!
//! Counting and binary semaphores with a bounded count. `give` beyond the
//! bound reports `Full` and never silently clamps.

use core::ptr::NonNull;

use crate::osal::critical::{critical_section, is_isr_context};
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};
use crate::osal::sched;
use crate::osal::tick;
use crate::osal::types::{Deadline, Timeout};
use crate::sync::wait::{WaitList, WaitNode};

struct SemInner {
    created: bool,
    count: u32,
    max: u32,
    waiters: WaitList,
    #[cfg(feature = "defmt")]
    name: &'static str,
}

/// Counting semaphore
pub struct Semaphore {
    inner: CsCell<SemInner>,
}

unsafe impl Sync for Semaphore {}
unsafe impl Send for Semaphore {}

impl Semaphore {
    pub const fn new() -> Self {
        Self {
            inner: CsCell::new(SemInner {
                created: false,
                count: 0,
                max: 0,
                waiters: WaitList::new(),
                #[cfg(feature = "defmt")]
                name: "",
            }),
        }
    }

    /// Initialize the semaphore with an initial count and a bound.
    ///
    /// `initial` must not exceed `max`; `max` must be non-zero.
    pub fn create(&self, initial: u32, max: u32, _name: &'static str) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }
        if max == 0 || initial > max {
            return Err(Error::InvalidParam);
        }

        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if inner.created {
                return Err(Error::AlreadyInit);
            }
            inner.created = true;
            inner.count = initial;
            inner.max = max;
            inner.waiters = WaitList::new();
            #[cfg(feature = "defmt")]
            {
                inner.name = _name;
            }
            Ok(())
        })
    }

    /// Initialize as a binary semaphore (count 0, bound 1)
    pub fn create_binary(&self, name: &'static str) -> Result<()> {
        self.create(0, 1, name)
    }

    /// Initialize as a counting semaphore
    pub fn create_counting(&self, initial: u32, max: u32, name: &'static str) -> Result<()> {
        self.create(initial, max, name)
    }

    /// Take one token, blocking up to `timeout`.
    ///
    /// Returns the count remaining after the take. `Timeout::None` attempts
    /// exactly once and reports `Timeout` when nothing is available.
    pub fn take(&self, timeout: Timeout) -> Result<u32> {
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
                if inner.count > 0 {
                    inner.count -= 1;
                    if node.is_queued(cs) {
                        inner.waiters.remove(cs, node_ptr);
                    }
                    return Some(Ok(inner.count));
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

    /// Release one token, waking the highest-priority waiter if any.
    ///
    /// Giving beyond the bound returns `Full`; the count never clamps.
    pub fn give(&self) -> Result<u32> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            if inner.count == inner.max {
                return Err(Error::Full);
            }
            inner.count += 1;
            if let Some(waiter) = inner.waiters.pop_first(cs) {
                sched::notify(unsafe { waiter.as_ref() });
            }
            Ok(inner.count)
        })
    }

    /// ISR-safe release; never blocks
    #[inline]
    pub fn give_from_isr(&self) -> Result<u32> {
        self.give()
    }

    /// Current count
    pub fn get_count(&self) -> Result<u32> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            Ok(inner.count)
        })
    }

    /// Force the count to `count`, waking as many waiters as it covers
    pub fn reset(&self, count: u32) -> Result<()> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            if count > inner.max {
                return Err(Error::InvalidParam);
            }
            inner.count = count;
            let mut available = count;
            while available > 0 {
                match inner.waiters.pop_first(cs) {
                    Some(waiter) => sched::notify(unsafe { waiter.as_ref() }),
                    None => break,
                }
                available -= 1;
            }
            Ok(())
        })
    }

    /// Tear the semaphore down. Deleting with active waiters is a caller
    /// contract violation and is rejected with `Busy`.
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
            inner.count = 0;
            inner.max = 0;
            Ok(())
        })
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
