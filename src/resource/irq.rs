//! Interrupt slot manager
//!
//! A fixed table mapping slot numbers to handler functions. On the host
//! build, [`IrqTable::trigger`] stands in for hardware interrupt delivery:
//! it runs the handler bracketed by the ISR nesting counter, so handlers
//! observe interrupt context exactly as they would on target.

use crate::osal::config::CFG_IRQ_SLOT_MAX;
use crate::osal::critical::{self, critical_section};
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};

/// Interrupt handler, invoked with the slot number that fired
pub type IrqHandler = fn(usize);

pub struct IrqTable {
    slots: CsCell<[Option<IrqHandler>; CFG_IRQ_SLOT_MAX]>,
}

unsafe impl Sync for IrqTable {}

impl IrqTable {
    pub const fn new() -> Self {
        Self {
            slots: CsCell::new([None; CFG_IRQ_SLOT_MAX]),
        }
    }

    /// Attach a handler to a slot. A slot holds at most one handler.
    pub fn register(&self, slot: usize, handler: IrqHandler) -> Result<()> {
        if slot >= CFG_IRQ_SLOT_MAX {
            return Err(Error::InvalidParam);
        }
        critical_section(|cs| {
            let entry = &mut self.slots.get(cs)[slot];
            if entry.is_some() {
                return Err(Error::AlreadyInit);
            }
            *entry = Some(handler);
            Ok(())
        })
    }

    /// Detach whatever handler occupies the slot
    pub fn unregister(&self, slot: usize) -> Result<()> {
        if slot >= CFG_IRQ_SLOT_MAX {
            return Err(Error::InvalidParam);
        }
        critical_section(|cs| {
            let entry = &mut self.slots.get(cs)[slot];
            if entry.is_none() {
                return Err(Error::NotFound);
            }
            *entry = None;
            Ok(())
        })
    }

    pub fn is_registered(&self, slot: usize) -> bool {
        slot < CFG_IRQ_SLOT_MAX
            && critical_section(|cs| self.slots.get(cs)[slot].is_some())
    }

    /// Deliver one interrupt to a slot, running its handler in
    /// (simulated) interrupt context
    pub fn trigger(&self, slot: usize) -> Result<()> {
        if slot >= CFG_IRQ_SLOT_MAX {
            return Err(Error::InvalidParam);
        }
        let handler = critical_section(|cs| self.slots.get(cs)[slot])
            .ok_or(Error::NotFound)?;
        critical::isr_enter();
        handler(slot);
        critical::isr_exit();
        Ok(())
    }
}

impl Default for IrqTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide interrupt table
pub static IRQ_TABLE: IrqTable = IrqTable::new();
