//! Waiter bookkeeping shared by all blocking primitives
//!
//! A [`WaitNode`] lives on the stack of a blocked caller; a [`WaitList`]
//! links the nodes currently waiting on one primitive, ordered by abstract
//! priority (highest first), then arrival. Link manipulation only happens
//! inside a critical section, so a node is never popped while its owner is
//! concurrently giving up and unwinding its stack.

use core::ptr::NonNull;

use portable_atomic::{AtomicBool, Ordering};

use crate::osal::critical::CriticalSection;
use crate::osal::cs_cell::CsCell;
use crate::osal::types::Priority;

#[derive(Clone, Copy)]
struct Links {
    next: Option<NonNull<WaitNode>>,
    prev: Option<NonNull<WaitNode>>,
    queued: bool,
}

/// One blocked caller.
pub struct WaitNode {
    signaled: AtomicBool,
    prio: Priority,
    links: CsCell<Links>,
}

impl WaitNode {
    pub fn new(prio: Priority) -> Self {
        Self {
            signaled: AtomicBool::new(false),
            prio,
            links: CsCell::new(Links { next: None, prev: None, queued: false }),
        }
    }

    /// Abstract priority of the waiting context
    #[inline]
    pub fn priority(&self) -> Priority {
        self.prio
    }

    /// Mark the node released; safe from ISRs and critical sections
    #[inline]
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn reset_signal(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_queued(&self, cs: CriticalSection<'_>) -> bool {
        self.links.get(cs).queued
    }
}

/// Ordered set of waiters on one primitive.
pub(crate) struct WaitList {
    head: Option<NonNull<WaitNode>>,
    tail: Option<NonNull<WaitNode>>,
}

unsafe impl Send for WaitList {}

impl WaitList {
    pub(crate) const fn new() -> Self {
        Self { head: None, tail: None }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert in priority order, highest first; equal priorities keep
    /// arrival order.
    pub(crate) fn insert(&mut self, cs: CriticalSection<'_>, node: NonNull<WaitNode>) {
        let node_ref = unsafe { node.as_ref() };
        debug_assert!(!node_ref.is_queued(cs));
        let prio = node_ref.prio;

        let mut current = self.head;
        let mut prev: Option<NonNull<WaitNode>> = None;

        while let Some(cur_ptr) = current {
            let cur_ref = unsafe { cur_ptr.as_ref() };
            if prio > cur_ref.prio {
                break;
            }
            prev = current;
            current = cur_ref.links.get(cs).next;
        }

        *node_ref.links.get(cs) = Links { next: current, prev, queued: true };

        match prev {
            Some(p) => unsafe { p.as_ref() }.links.get(cs).next = Some(node),
            None => self.head = Some(node),
        }

        match current {
            Some(c) => unsafe { c.as_ref() }.links.get(cs).prev = Some(node),
            None => self.tail = Some(node),
        }
    }

    /// Remove a specific node
    pub(crate) fn remove(&mut self, cs: CriticalSection<'_>, node: NonNull<WaitNode>) {
        let node_ref = unsafe { node.as_ref() };
        let links = *node_ref.links.get(cs);

        if !links.queued {
            return;
        }

        match links.prev {
            Some(p) => unsafe { p.as_ref() }.links.get(cs).next = links.next,
            None => self.head = links.next,
        }

        match links.next {
            Some(n) => unsafe { n.as_ref() }.links.get(cs).prev = links.prev,
            None => self.tail = links.prev,
        }

        *node_ref.links.get(cs) = Links { next: None, prev: None, queued: false };
    }

    /// Pop the highest-priority, earliest-arrived waiter
    pub(crate) fn pop_first(&mut self, cs: CriticalSection<'_>) -> Option<NonNull<WaitNode>> {
        let head = self.head?;
        self.remove(cs, head);
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osal::critical::critical_section;

    fn prio_of(node: Option<NonNull<WaitNode>>) -> Option<Priority> {
        node.map(|n| unsafe { n.as_ref() }.priority())
    }

    #[test]
    fn test_release_order_priority_then_arrival() {
        let low_a = WaitNode::new(3);
        let low_b = WaitNode::new(3);
        let high = WaitNode::new(20);
        let mid = WaitNode::new(10);

        critical_section(|cs| {
            let mut list = WaitList::new();
            list.insert(cs, NonNull::from(&low_a));
            list.insert(cs, NonNull::from(&high));
            list.insert(cs, NonNull::from(&low_b));
            list.insert(cs, NonNull::from(&mid));

            assert_eq!(prio_of(list.pop_first(cs)), Some(20));
            assert_eq!(prio_of(list.pop_first(cs)), Some(10));
            // equal priority: arrival order
            assert!(core::ptr::eq(
                list.pop_first(cs).unwrap().as_ptr(),
                &low_a as *const _ as *mut _
            ));
            assert!(core::ptr::eq(
                list.pop_first(cs).unwrap().as_ptr(),
                &low_b as *const _ as *mut _
            ));
            assert!(list.is_empty());
        });
    }

    #[test]
    fn test_remove_mid_list() {
        let a = WaitNode::new(1);
        let b = WaitNode::new(2);
        let c = WaitNode::new(3);

        critical_section(|cs| {
            let mut list = WaitList::new();
            list.insert(cs, NonNull::from(&a));
            list.insert(cs, NonNull::from(&b));
            list.insert(cs, NonNull::from(&c));

            list.remove(cs, NonNull::from(&b));
            assert!(!b.is_queued(cs));

            assert_eq!(prio_of(list.pop_first(cs)), Some(3));
            assert_eq!(prio_of(list.pop_first(cs)), Some(1));
            assert!(list.is_empty());
        });
    }
}
