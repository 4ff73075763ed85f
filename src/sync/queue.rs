//! Bounded message queue
//!
//! Fixed-capacity FIFO of `Copy` items. An item received is byte-identical
//! to the item sent; order is FIFO unless `send_front` is used. Both ends
//! block through the scheduler contract, with ISR-safe try variants.

use core::ptr::NonNull;

use crate::osal::critical::{critical_section, is_isr_context};
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};
use crate::osal::sched;
use crate::osal::tick;
use crate::osal::types::{Deadline, Timeout};
use crate::sync::wait::{WaitList, WaitNode};

struct QueueInner<T: Copy, const N: usize> {
    created: bool,
    buf: [Option<T>; N],
    head: usize,
    len: usize,
    tx_waiters: WaitList,
    rx_waiters: WaitList,
    #[cfg(feature = "defmt")]
    name: &'static str,
}

impl<T: Copy, const N: usize> QueueInner<T, N> {
    #[inline]
    fn tail(&self) -> usize {
        (self.head + self.len) % N
    }

    fn push_back(&mut self, item: T) {
        let tail = self.tail();
        self.buf[tail] = Some(item);
        self.len += 1;
    }

    fn push_front(&mut self, item: T) {
        self.head = (self.head + N - 1) % N;
        self.buf[self.head] = Some(item);
        self.len += 1;
    }

    fn pop_front(&mut self) -> T {
        let item = self.buf[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;
        debug_assert!(item.is_some());
        // len > 0 was checked by the caller under the same critical section
        item.unwrap_or_else(|| unreachable!())
    }
}

/// Bounded FIFO queue of `Copy` items
pub struct Queue<T: Copy, const N: usize> {
    inner: CsCell<QueueInner<T, N>>,
}

unsafe impl<T: Copy, const N: usize> Sync for Queue<T, N> {}
unsafe impl<T: Copy, const N: usize> Send for Queue<T, N> {}

impl<T: Copy, const N: usize> Queue<T, N> {
    pub const fn new() -> Self {
        Self {
            inner: CsCell::new(QueueInner {
                created: false,
                buf: [None; N],
                head: 0,
                len: 0,
                tx_waiters: WaitList::new(),
                rx_waiters: WaitList::new(),
                #[cfg(feature = "defmt")]
                name: "",
            }),
        }
    }

    /// Initialize the queue; the item type and capacity are fixed by the
    /// type parameters.
    pub fn create(&self, _name: &'static str) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }
        if N == 0 {
            return Err(Error::InvalidParam);
        }

        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if inner.created {
                return Err(Error::AlreadyInit);
            }
            inner.created = true;
            inner.buf = [None; N];
            inner.head = 0;
            inner.len = 0;
            inner.tx_waiters = WaitList::new();
            inner.rx_waiters = WaitList::new();
            #[cfg(feature = "defmt")]
            {
                inner.name = _name;
            }
            Ok(())
        })
    }

    fn send_inner(&self, item: T, timeout: Timeout, front: bool) -> Result<()> {
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
                if inner.len < N {
                    if front {
                        inner.push_front(item);
                    } else {
                        inner.push_back(item);
                    }
                    if node.is_queued(cs) {
                        inner.tx_waiters.remove(cs, node_ptr);
                    }
                    if let Some(waiter) = inner.rx_waiters.pop_first(cs) {
                        sched::notify(unsafe { waiter.as_ref() });
                    }
                    return Some(Ok(()));
                }
                if tick::expired(deadline) {
                    if node.is_queued(cs) {
                        inner.tx_waiters.remove(cs, node_ptr);
                    }
                    let err = match deadline {
                        Deadline::Poll => Error::Full,
                        _ => Error::Timeout,
                    };
                    return Some(Err(err));
                }
                if !node.is_queued(cs) {
                    node.reset_signal();
                    inner.tx_waiters.insert(cs, node_ptr);
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

    /// Append an item, blocking for space up to `timeout`
    pub fn send(&self, item: T, timeout: Timeout) -> Result<()> {
        self.send_inner(item, timeout, false)
    }

    /// Insert an item ahead of FIFO order
    pub fn send_front(&self, item: T, timeout: Timeout) -> Result<()> {
        self.send_inner(item, timeout, true)
    }

    /// ISR-safe send; reports `Full` instead of blocking
    pub fn send_from_isr(&self, item: T) -> Result<()> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            if inner.len == N {
                return Err(Error::Full);
            }
            inner.push_back(item);
            if let Some(waiter) = inner.rx_waiters.pop_first(cs) {
                sched::notify(unsafe { waiter.as_ref() });
            }
            Ok(())
        })
    }

    /// Remove the oldest item, blocking for data up to `timeout`
    pub fn receive(&self, timeout: Timeout) -> Result<T> {
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
                if inner.len > 0 {
                    let item = inner.pop_front();
                    if node.is_queued(cs) {
                        inner.rx_waiters.remove(cs, node_ptr);
                    }
                    if let Some(waiter) = inner.tx_waiters.pop_first(cs) {
                        sched::notify(unsafe { waiter.as_ref() });
                    }
                    return Some(Ok(item));
                }
                if tick::expired(deadline) {
                    if node.is_queued(cs) {
                        inner.rx_waiters.remove(cs, node_ptr);
                    }
                    let err = match deadline {
                        Deadline::Poll => Error::Empty,
                        _ => Error::Timeout,
                    };
                    return Some(Err(err));
                }
                if !node.is_queued(cs) {
                    node.reset_signal();
                    inner.rx_waiters.insert(cs, node_ptr);
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

    /// ISR-safe receive; reports `Empty` instead of blocking
    pub fn receive_from_isr(&self) -> Result<T> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            if inner.len == 0 {
                return Err(Error::Empty);
            }
            let item = inner.pop_front();
            if let Some(waiter) = inner.tx_waiters.pop_first(cs) {
                sched::notify(unsafe { waiter.as_ref() });
            }
            Ok(item)
        })
    }

    /// Copy the oldest item without removing it
    pub fn peek(&self) -> Result<T> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            if inner.len == 0 {
                return Err(Error::Empty);
            }
            inner.buf[inner.head].ok_or(Error::Empty)
        })
    }

    /// Number of queued items
    pub fn get_count(&self) -> Result<usize> {
        critical_section(|cs| {
            let inner = self.inner.get(cs);
            if !inner.created {
                return Err(Error::NotInit);
            }
            Ok(inner.len)
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.get_count()? == 0)
    }

    pub fn is_full(&self) -> Result<bool> {
        Ok(self.get_count()? == N)
    }

    /// Capacity fixed at compile time
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Tear the queue down. Deleting with blocked senders or receivers is
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
            if !inner.tx_waiters.is_empty() || !inner.rx_waiters.is_empty() {
                return Err(Error::Busy);
            }
            inner.created = false;
            inner.buf = [None; N];
            inner.head = 0;
            inner.len = 0;
            Ok(())
        })
    }
}

impl<T: Copy, const N: usize> Default for Queue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
