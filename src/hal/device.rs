//! Device model
//!
//! A [`Descriptor`] is the static record for one peripheral instance:
//! name, configuration, lifecycle driver, and the runtime state the
//! registry manages (state machine, bounded reference count, init guard).
//! Descriptors are allocated statically at startup and never destroyed.

use crate::osal::config::CFG_DEVICE_REF_MAX;
use crate::osal::critical::critical_section;
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};
use crate::hal::comm::{BlockingComm, NonBlockingComm};

/// Configuration blob applied at device init; the driver defines the layout
pub type DeviceConfig = &'static [u8];

/// Device lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceState {
    /// Descriptor exists but was never registered
    Unregistered = 0,
    /// Registered, not activated (`ref_count == 0`)
    Inactive = 1,
    /// Activated (`ref_count > 0`)
    Active = 2,
    /// Activated but suspended by the power path
    Suspended = 3,
    /// A deinit or reinit failed; holders must drain their references
    Error = 4,
}

/// Device lifecycle operations supplied by the owning driver.
///
/// `init` and `deinit` bracket the active lifetime: `init` runs exactly
/// once per 0→1 reference transition, `deinit` exactly once per 1→0.
/// The registry never calls these while holding a critical section, so a
/// slow activation never blocks unrelated devices.
pub trait Driver: Sync {
    fn init(&self, config: &[u8]) -> Result<()>;
    fn deinit(&self) -> Result<()>;

    fn suspend(&self) -> Result<()> {
        Err(Error::NotSupported)
    }

    fn resume(&self) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Non-blocking communication interface, if the driver has one
    fn nonblocking(&self) -> Option<&dyn NonBlockingComm> {
        None
    }

    /// Blocking communication interface, if the driver has one
    fn blocking(&self) -> Option<&dyn BlockingComm> {
        None
    }
}

pub(crate) struct DeviceRuntime {
    pub(crate) state: DeviceState,
    pub(crate) ref_count: u8,
    pub(crate) initializing: bool,
    pub(crate) config: Option<DeviceConfig>,
}

/// Static descriptor for one peripheral instance
pub struct Descriptor {
    name: &'static str,
    driver: &'static dyn Driver,
    default_config: DeviceConfig,
    pub(crate) runtime: CsCell<DeviceRuntime>,
}

impl Descriptor {
    pub const fn new(
        name: &'static str,
        driver: &'static dyn Driver,
        default_config: DeviceConfig,
    ) -> Self {
        Self {
            name,
            driver,
            default_config,
            runtime: CsCell::new(DeviceRuntime {
                state: DeviceState::Unregistered,
                ref_count: 0,
                initializing: false,
                config: None,
            }),
        }
    }

    /// Registry key, stable for the process lifetime
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn driver(&self) -> &'static dyn Driver {
        self.driver
    }

    /// Configuration supplied at construction time
    #[inline]
    pub fn default_config(&self) -> DeviceConfig {
        self.default_config
    }

    /// Configuration the next activation will use
    pub fn effective_config(&self) -> DeviceConfig {
        critical_section(|cs| self.runtime.get(cs).config).unwrap_or(self.default_config)
    }

    /// Current lifecycle state
    pub fn state(&self) -> DeviceState {
        critical_section(|cs| self.runtime.get(cs).state)
    }

    /// Number of active holders, `0..=CFG_DEVICE_REF_MAX`
    pub fn ref_count(&self) -> u8 {
        critical_section(|cs| self.runtime.get(cs).ref_count)
    }

    #[inline]
    pub(crate) fn at_ref_limit(count: u8) -> bool {
        count >= CFG_DEVICE_REF_MAX
    }
}

/// Cached interface handle returned by [`registry::get`](crate::hal::registry::get).
///
/// Valid only while the holder's reference is live (between `get` and the
/// matching `put`); identity is stable across `reinit`.
#[derive(Clone, Copy)]
pub struct DeviceHandle {
    pub(crate) desc: &'static Descriptor,
}

impl DeviceHandle {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.desc.name()
    }

    #[inline]
    pub fn descriptor(&self) -> &'static Descriptor {
        self.desc
    }

    /// The driver's non-blocking interface, or `NotSupported`
    pub fn nonblocking(&self) -> Result<&'static dyn NonBlockingComm> {
        self.desc.driver().nonblocking().ok_or(Error::NotSupported)
    }

    /// The driver's blocking interface, or `NotSupported`
    pub fn blocking(&self) -> Result<&'static dyn BlockingComm> {
        self.desc.driver().blocking().ok_or(Error::NotSupported)
    }
}
