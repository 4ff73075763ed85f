//! DMA channel manager
//!
//! A fixed table of channels with exclusive ownership: allocation hands
//! out a move-only [`DmaChannel`] token, and every configure/start/stop
//! call goes through that token, so two owners of the same channel cannot
//! coexist without `unsafe`. The host build models transfer completion by
//! running the one-shot path synchronously inside `start`.

use crate::osal::config::CFG_DMA_CHANNEL_MAX;
use crate::osal::critical::{self, critical_section};
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};

/// Completion callback, invoked in interrupt context with the number of
/// transferred units
pub type DmaCallback = fn(usize);

/// One transfer description. `width` is the unit size in bytes (1, 2 or 4);
/// `count` is in units.
#[derive(Clone, Copy)]
pub struct DmaTransfer {
    pub src: usize,
    pub dst: usize,
    pub count: usize,
    pub width: u8,
    pub circular: bool,
    pub callback: Option<DmaCallback>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    Free,
    Allocated,
    Busy,
}

#[derive(Clone, Copy)]
struct Channel {
    state: ChannelState,
    transfer: Option<DmaTransfer>,
    remaining: usize,
}

impl Channel {
    const FREE: Channel = Channel {
        state: ChannelState::Free,
        transfer: None,
        remaining: 0,
    };
}

/// Owning token for one allocated channel. Dropping it without calling
/// [`DmaChannel::release`] leaks the channel until reset.
pub struct DmaChannel<'a> {
    ctrl: &'a DmaController,
    index: usize,
}

pub struct DmaController {
    channels: CsCell<[Channel; CFG_DMA_CHANNEL_MAX]>,
}

unsafe impl Sync for DmaController {}

impl DmaController {
    pub const fn new() -> Self {
        Self {
            channels: CsCell::new([Channel::FREE; CFG_DMA_CHANNEL_MAX]),
        }
    }

    /// Claim a channel by index. `None` when the index is out of range or
    /// the channel is already owned.
    pub fn allocate(&self, index: usize) -> Option<DmaChannel<'_>> {
        if index >= CFG_DMA_CHANNEL_MAX {
            return None;
        }
        let claimed = critical_section(|cs| {
            let ch = &mut self.channels.get(cs)[index];
            if ch.state == ChannelState::Free {
                ch.state = ChannelState::Allocated;
                true
            } else {
                false
            }
        });
        if claimed {
            crate::trace!("dma: channel {} allocated", index);
            Some(DmaChannel { ctrl: self, index })
        } else {
            None
        }
    }

    /// Observe a channel's state without owning it
    pub fn state_of(&self, index: usize) -> Result<ChannelState> {
        if index >= CFG_DMA_CHANNEL_MAX {
            return Err(Error::InvalidParam);
        }
        Ok(critical_section(|cs| self.channels.get(cs)[index].state))
    }
}

impl Default for DmaController {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaChannel<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Store transfer parameters. Rejected while a transfer is running.
    pub fn configure(&mut self, transfer: DmaTransfer) -> Result<()> {
        if transfer.count == 0 || !matches!(transfer.width, 1 | 2 | 4) {
            return Err(Error::InvalidParam);
        }
        critical_section(|cs| {
            let ch = &mut self.ctrl.channels.get(cs)[self.index];
            if ch.state == ChannelState::Busy {
                return Err(Error::Busy);
            }
            ch.transfer = Some(transfer);
            Ok(())
        })
    }

    /// Kick off the configured transfer.
    ///
    /// One-shot transfers complete immediately on the host model: the
    /// callback runs in simulated interrupt context and the channel
    /// returns to `Allocated`. Circular transfers stay `Busy` until
    /// [`DmaChannel::stop`].
    pub fn start(&mut self) -> Result<()> {
        let transfer = critical_section(|cs| {
            let ch = &mut self.ctrl.channels.get(cs)[self.index];
            if ch.state == ChannelState::Busy {
                return Err(Error::Busy);
            }
            let transfer = ch.transfer.ok_or(Error::NotInit)?;
            ch.state = ChannelState::Busy;
            ch.remaining = transfer.count;
            Ok(transfer)
        })?;

        if transfer.circular {
            crate::trace!("dma: channel {} circular transfer running", self.index);
            return Ok(());
        }

        // Completion interrupt, delivered outside the critical section.
        if let Some(callback) = transfer.callback {
            critical::isr_enter();
            callback(transfer.count);
            critical::isr_exit();
        }
        critical_section(|cs| {
            let ch = &mut self.ctrl.channels.get(cs)[self.index];
            ch.state = ChannelState::Allocated;
            ch.remaining = 0;
        });
        Ok(())
    }

    /// Halt a running transfer. `InvalidState` when nothing is running.
    pub fn stop(&mut self) -> Result<()> {
        critical_section(|cs| {
            let ch = &mut self.ctrl.channels.get(cs)[self.index];
            if ch.state != ChannelState::Busy {
                return Err(Error::InvalidState);
            }
            ch.state = ChannelState::Allocated;
            ch.remaining = 0;
            Ok(())
        })
    }

    /// Give the channel back, halting any running transfer first.
    /// Consumes the token.
    pub fn release(self) {
        critical_section(|cs| {
            let ch = &mut self.ctrl.channels.get(cs)[self.index];
            ch.state = ChannelState::Free;
            ch.transfer = None;
            ch.remaining = 0;
        });
        crate::trace!("dma: channel {} released", self.index);
    }
}
