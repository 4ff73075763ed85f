//! Mutex implementation
//!
//! Mutual exclusion with owner tracking and bounded recursion. Unlock by a
//! non-owner is a contract violation and is rejected; priority inversion
//! handling is a backend property and not part of the external contract.

use core::ptr::NonNull;

use crate::osal::critical::{critical_section, is_isr_context};
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};
use crate::osal::sched;
use crate::osal::tick;
use crate::osal::types::{Deadline, NestingCtr, Timeout};
use crate::sync::wait::{WaitList, WaitNode};

struct MutexInner {
    created: bool,
    owner: Option<usize>,
    nesting: NestingCtr,
    waiters: WaitList,
    #[cfg(feature = "defmt")]
    name: &'static str,
}

/// Mutex with recursive locking by the owner
pub struct Mutex {
    inner: CsCell<MutexInner>,
}

unsafe impl Sync for Mutex {}
unsafe impl Send for Mutex {}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            inner: CsCell::new(MutexInner {
                created: false,
                owner: None,
                nesting: 0,
                waiters: WaitList::new(),
                #[cfg(feature = "defmt")]
                name: "",
            }),
        }
    }

    /// Initialize the mutex
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
            inner.owner = None;
            inner.nesting = 0;
            inner.waiters = WaitList::new();
            #[cfg(feature = "defmt")]
            {
                inner.name = _name;
            }
            Ok(())
        })
    }

    /// Acquire the mutex, blocking up to `timeout`.
    ///
    /// The owner may lock again recursively; each lock needs a matching
    /// unlock.
    pub fn lock(&self, timeout: Timeout) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }

        let me = sched::current_id();
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
                match inner.owner {
                    None => {
                        inner.owner = Some(me);
                        inner.nesting = 1;
                        if node.is_queued(cs) {
                            inner.waiters.remove(cs, node_ptr);
                        }
                        Some(Ok(()))
                    }
                    Some(owner) if owner == me => {
                        if inner.nesting == NestingCtr::MAX {
                            return Some(Err(Error::InvalidState));
                        }
                        inner.nesting += 1;
                        if node.is_queued(cs) {
                            inner.waiters.remove(cs, node_ptr);
                        }
                        Some(Ok(()))
                    }
                    Some(_) => {
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
                    }
                }
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

    /// Release the mutex. Only the owner may unlock; anything else is a
    /// contract violation reported as `InvalidState`.
    pub fn unlock(&self) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }

        let me = sched::current_id();

        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            if inner.owner != Some(me) {
                return Err(Error::InvalidState);
            }
            inner.nesting -= 1;
            if inner.nesting > 0 {
                return Ok(());
            }
            inner.owner = None;
            if let Some(waiter) = inner.waiters.pop_first(cs) {
                sched::notify(unsafe { waiter.as_ref() });
            }
            Ok(())
        })
    }

    /// True while some context holds the lock
    pub fn is_locked(&self) -> Result<bool> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            Ok(inner.owner.is_some())
        })
    }

    /// Tear the mutex down. Deleting while locked or with waiters is
    /// rejected with `Busy`.
    pub fn delete(&self) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            if inner.owner.is_some() || !inner.waiters.is_empty() {
                return Err(Error::Busy);
            }
            inner.created = false;
            Ok(())
        })
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
