//! Communication interface set
//!
//! The only boundary between this core and concrete peripheral logic.
//! Drivers expose one or both styles; the adapter converts between them.

use crate::osal::error::Result;
use crate::osal::types::Timeout;

/// Non-blocking (poll-style) communication.
///
/// Calls return immediately; progress is observed through `send_busy` and
/// repeated `receive_poll`.
pub trait NonBlockingComm: Sync {
    /// Start a send. Reports `Busy` while a previous send is in flight.
    fn send_start(&self, data: &[u8]) -> Result<()>;

    /// True while a started send has not completed
    fn send_busy(&self) -> bool;

    /// Fetch received data if any; reports `Empty` when nothing is pending
    fn receive_poll(&self, buf: &mut [u8]) -> Result<usize>;

    /// Start a simultaneous send and receive
    fn transceive_start(&self, _tx: &[u8], _rx: &mut [u8]) -> Result<()> {
        Err(crate::osal::error::Error::NotSupported)
    }
}

/// Blocking (timeout-style) communication.
pub trait BlockingComm: Sync {
    /// Send all of `data`, blocking up to `timeout`
    fn send(&self, data: &[u8], timeout: Timeout) -> Result<()>;

    /// Receive at least one byte into `buf`, blocking up to `timeout`
    fn receive(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize>;

    /// Simultaneous send and receive, blocking up to `timeout`
    fn transceive(&self, _tx: &[u8], _rx: &mut [u8], _timeout: Timeout) -> Result<()> {
        Err(crate::osal::error::Error::NotSupported)
    }
}
