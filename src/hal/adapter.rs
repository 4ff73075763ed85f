//! Async/sync communication adapter
//!
//! Converts between the two communication styles in both directions:
//!
//! - blocking calls over a non-blocking interface: start the underlying
//!   operation once, then poll-and-yield on the monotonic tick until it
//!   completes or the caller's timeout elapses
//! - non-blocking calls over a blocking interface: stage the request and
//!   return immediately; a caller-driven [`Adapter::pump`] step runs the
//!   blocking call with the adapter's default timeout on whatever context
//!   invokes it (a dedicated task under a preemptive backend, the main
//!   loop under the cooperative one)
//!
//! Adapters come from a fixed pool. An adapter wraps exactly one
//! underlying interface for its entire lifetime; releasing it with an
//! operation still outstanding is a caller contract violation the adapter
//! does not detect.

use crate::osal::config::{CFG_ADAPTER_BUF_SIZE, CFG_ADAPTER_POOL_SIZE};
use crate::osal::critical::{critical_section, is_isr_context};
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};
use crate::osal::sched;
use crate::osal::tick;
use crate::osal::types::{Deadline, Timeout};
use crate::hal::comm::{BlockingComm, NonBlockingComm};

#[derive(Clone, Copy)]
struct BlockingSide {
    io: &'static dyn NonBlockingComm,
    default_timeout: Timeout,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PendingOp {
    Idle,
    SendQueued,
    SendRunning,
    RecvQueued,
    RecvRunning,
}

struct NonBlockingSide {
    io: &'static dyn BlockingComm,
    default_timeout: Timeout,
    op: PendingOp,
    tx_buf: [u8; CFG_ADAPTER_BUF_SIZE],
    tx_len: usize,
    rx_buf: [u8; CFG_ADAPTER_BUF_SIZE],
    rx_len: usize,
    rx_ready: bool,
    send_result: Option<Result<()>>,
}

enum AdapterKind {
    Unused,
    Blocking(BlockingSide),
    NonBlocking(NonBlockingSide),
}

enum PumpAction {
    Idle,
    Send {
        io: &'static dyn BlockingComm,
        timeout: Timeout,
        buf: [u8; CFG_ADAPTER_BUF_SIZE],
        len: usize,
    },
    Recv {
        io: &'static dyn BlockingComm,
        timeout: Timeout,
    },
}

/// One direction-converting adapter object
pub struct Adapter {
    state: CsCell<AdapterKind>,
}

unsafe impl Sync for Adapter {}

impl Adapter {
    const fn new() -> Self {
        Self {
            state: CsCell::new(AdapterKind::Unused),
        }
    }

    fn blocking_side(&self) -> Result<BlockingSide> {
        critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(side) => Ok(*side),
            AdapterKind::NonBlocking(_) => Err(Error::NotSupported),
            AdapterKind::Unused => Err(Error::InvalidState),
        })
    }

    /// The default timeout fixed at creation time
    pub fn default_timeout(&self) -> Result<Timeout> {
        critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(side) => Ok(side.default_timeout),
            AdapterKind::NonBlocking(side) => Ok(side.default_timeout),
            AdapterKind::Unused => Err(Error::InvalidState),
        })
    }

    /// Completion status of the last pumped send, mapped for the
    /// non-blocking caller: an underlying timeout reads as `Busy`.
    /// Reading consumes the status.
    pub fn send_result(&self) -> Option<Result<()>> {
        critical_section(|cs| match self.state.get(cs) {
            AdapterKind::NonBlocking(side) => side.send_result.take(),
            _ => None,
        })
    }

    /// Run one staged operation to completion on the calling context.
    ///
    /// No-op when nothing is staged. Performs blocking calls, so it must
    /// not be invoked from an ISR.
    pub fn pump(&self) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }

        let action = critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Unused => Err(Error::InvalidState),
            AdapterKind::Blocking(_) => Ok(PumpAction::Idle),
            AdapterKind::NonBlocking(side) => match side.op {
                PendingOp::SendQueued => {
                    side.op = PendingOp::SendRunning;
                    Ok(PumpAction::Send {
                        io: side.io,
                        timeout: side.default_timeout,
                        buf: side.tx_buf,
                        len: side.tx_len,
                    })
                }
                PendingOp::RecvQueued => {
                    side.op = PendingOp::RecvRunning;
                    Ok(PumpAction::Recv {
                        io: side.io,
                        timeout: side.default_timeout,
                    })
                }
                _ => Ok(PumpAction::Idle),
            },
        })?;

        match action {
            PumpAction::Idle => Ok(()),
            PumpAction::Send { io, timeout, buf, len } => {
                let outcome = io.send(&buf[..len], timeout);
                critical_section(|cs| {
                    if let AdapterKind::NonBlocking(side) = self.state.get(cs) {
                        side.op = PendingOp::Idle;
                        // The non-blocking caller saw the resource as
                        // unavailable, not as timed out.
                        side.send_result = Some(match outcome {
                            Err(Error::Timeout) => Err(Error::Busy),
                            other => other,
                        });
                    }
                });
                Ok(())
            }
            PumpAction::Recv { io, timeout } => {
                let mut tmp = [0u8; CFG_ADAPTER_BUF_SIZE];
                let outcome = io.receive(&mut tmp, timeout);
                critical_section(|cs| {
                    if let AdapterKind::NonBlocking(side) = self.state.get(cs) {
                        side.op = PendingOp::Idle;
                        // An underlying timeout stores nothing and keeps
                        // reading as "no data".
                        if let Ok(n) = outcome {
                            let n = n.min(CFG_ADAPTER_BUF_SIZE);
                            side.rx_buf[..n].copy_from_slice(&tmp[..n]);
                            side.rx_len = n;
                            side.rx_ready = true;
                        }
                    }
                });
                Ok(())
            }
        }
    }
}

impl BlockingComm for Adapter {
    /// Blocking send. Over a non-blocking interface: start once, then
    /// poll idle/busy with yields until completion or timeout.
    ///
    /// If the underlying interface is still draining a previous send
    /// (for example after a timed-out call), `send_start` reports `Busy`
    /// and that is returned as-is; `Busy` is transient and the caller may
    /// retry.
    fn send(&self, data: &[u8], timeout: Timeout) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }
        let forward = critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(_) => Ok(None),
            AdapterKind::NonBlocking(side) => Ok(Some(side.io)),
            AdapterKind::Unused => Err(Error::InvalidState),
        })?;
        if let Some(io) = forward {
            return io.send(data, timeout);
        }

        let side = self.blocking_side()?;
        let deadline = tick::deadline_of(timeout);
        let sched = match deadline {
            Deadline::Poll => None,
            _ => Some(sched::current()?),
        };

        side.io.send_start(data)?;
        loop {
            if !side.io.send_busy() {
                return Ok(());
            }
            if tick::expired(deadline) {
                return Err(Error::Timeout);
            }
            if let Some(s) = sched {
                s.yield_now();
            }
        }
    }

    /// Blocking receive: poll the non-blocking side until at least one
    /// byte arrives or the timeout elapses.
    fn receive(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }
        let forward = critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(_) => Ok(None),
            AdapterKind::NonBlocking(side) => Ok(Some(side.io)),
            AdapterKind::Unused => Err(Error::InvalidState),
        })?;
        if let Some(io) = forward {
            return io.receive(buf, timeout);
        }

        let side = self.blocking_side()?;
        let deadline = tick::deadline_of(timeout);
        let sched = match deadline {
            Deadline::Poll => None,
            _ => Some(sched::current()?),
        };

        loop {
            match side.io.receive_poll(buf) {
                Ok(n) => return Ok(n),
                Err(Error::Empty) => {
                    if tick::expired(deadline) {
                        return Err(Error::Timeout);
                    }
                    if let Some(s) = sched {
                        s.yield_now();
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn transceive(&self, tx: &[u8], rx: &mut [u8], timeout: Timeout) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }
        let forward = critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(_) => Ok(None),
            AdapterKind::NonBlocking(side) => Ok(Some(side.io)),
            AdapterKind::Unused => Err(Error::InvalidState),
        })?;
        if let Some(io) = forward {
            return io.transceive(tx, rx, timeout);
        }

        let side = self.blocking_side()?;
        let deadline = tick::deadline_of(timeout);
        let sched = match deadline {
            Deadline::Poll => None,
            _ => Some(sched::current()?),
        };

        side.io.transceive_start(tx, rx)?;
        loop {
            if !side.io.send_busy() {
                return Ok(());
            }
            if tick::expired(deadline) {
                return Err(Error::Timeout);
            }
            if let Some(s) = sched {
                s.yield_now();
            }
        }
    }
}

impl NonBlockingComm for Adapter {
    /// Non-blocking send. Over a blocking interface: stage the bytes and
    /// return immediately; `Busy` while a previous operation is
    /// outstanding.
    fn send_start(&self, data: &[u8]) -> Result<()> {
        critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(side) => side.io.send_start(data),
            AdapterKind::NonBlocking(side) => {
                if side.op != PendingOp::Idle {
                    return Err(Error::Busy);
                }
                if data.len() > CFG_ADAPTER_BUF_SIZE {
                    return Err(Error::InvalidParam);
                }
                side.tx_buf[..data.len()].copy_from_slice(data);
                side.tx_len = data.len();
                side.op = PendingOp::SendQueued;
                side.send_result = None;
                Ok(())
            }
            AdapterKind::Unused => Err(Error::InvalidState),
        })
    }

    fn send_busy(&self) -> bool {
        critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(side) => side.io.send_busy(),
            AdapterKind::NonBlocking(side) => {
                matches!(side.op, PendingOp::SendQueued | PendingOp::SendRunning)
            }
            AdapterKind::Unused => false,
        })
    }

    /// Non-blocking receive: hand out pumped data, or stage a receive
    /// request and report `Empty`.
    fn receive_poll(&self, buf: &mut [u8]) -> Result<usize> {
        critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(side) => side.io.receive_poll(buf),
            AdapterKind::NonBlocking(side) => {
                if side.rx_ready {
                    let n = side.rx_len.min(buf.len());
                    buf[..n].copy_from_slice(&side.rx_buf[..n]);
                    side.rx_ready = false;
                    return Ok(n);
                }
                if side.op == PendingOp::Idle {
                    side.op = PendingOp::RecvQueued;
                }
                Err(Error::Empty)
            }
            AdapterKind::Unused => Err(Error::InvalidState),
        })
    }

    fn transceive_start(&self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        critical_section(|cs| match self.state.get(cs) {
            AdapterKind::Blocking(side) => side.io.transceive_start(tx, rx),
            AdapterKind::NonBlocking(_) => Err(Error::NotSupported),
            AdapterKind::Unused => Err(Error::InvalidState),
        })
    }
}

// ============ Fixed pool ============

/// Fixed-size pool of adapter objects.
///
/// Exhaustion is a normal, recoverable condition: creation reports
/// `OutOfMemory` and no partial adapter is left behind.
pub struct AdapterPool {
    slots: [Adapter; CFG_ADAPTER_POOL_SIZE],
}

impl AdapterPool {
    pub const fn new() -> Self {
        Self {
            slots: [const { Adapter::new() }; CFG_ADAPTER_POOL_SIZE],
        }
    }

    fn claim(&self, kind: AdapterKind) -> Result<&Adapter> {
        let mut kind = Some(kind);
        for slot in &self.slots {
            let claimed = critical_section(|cs| {
                let state = slot.state.get(cs);
                if matches!(state, AdapterKind::Unused) {
                    *state = kind.take().unwrap_or(AdapterKind::Unused);
                    true
                } else {
                    false
                }
            });
            if claimed {
                return Ok(slot);
            }
        }
        Err(Error::OutOfMemory)
    }

    /// Create an adapter exposing blocking calls over a non-blocking
    /// interface
    pub fn create_blocking(
        &self,
        io: &'static dyn NonBlockingComm,
        default_timeout: Timeout,
    ) -> Result<&Adapter> {
        self.claim(AdapterKind::Blocking(BlockingSide { io, default_timeout }))
    }

    /// Create an adapter exposing non-blocking calls over a blocking
    /// interface
    pub fn create_nonblocking(
        &self,
        io: &'static dyn BlockingComm,
        default_timeout: Timeout,
    ) -> Result<&Adapter> {
        self.claim(AdapterKind::NonBlocking(NonBlockingSide {
            io,
            default_timeout,
            op: PendingOp::Idle,
            tx_buf: [0; CFG_ADAPTER_BUF_SIZE],
            tx_len: 0,
            rx_buf: [0; CFG_ADAPTER_BUF_SIZE],
            rx_len: 0,
            rx_ready: false,
            send_result: None,
        }))
    }

    /// Return an adapter to the pool. The caller must have quiesced all
    /// operations on it first.
    pub fn release(&self, adapter: &Adapter) -> Result<()> {
        if !self.slots.iter().any(|slot| core::ptr::eq(slot, adapter)) {
            return Err(Error::NotFound);
        }
        critical_section(|cs| {
            let state = adapter.state.get(cs);
            match state {
                AdapterKind::Unused => Err(Error::InvalidState),
                _ => {
                    *state = AdapterKind::Unused;
                    Ok(())
                }
            }
        })
    }
}

impl Default for AdapterPool {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide adapter pool
pub static ADAPTER_POOL: AdapterPool = AdapterPool::new();
