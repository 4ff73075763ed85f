//! Device registry
//!
//! Static name-keyed table of device descriptors with reference-counted
//! lazy activation. The check-and-increment step runs under a critical
//! section; the driver's `init`/`deinit` run outside it behind a
//! per-descriptor guard, so one device's slow activation never blocks
//! another's.
//!
//! `reinit` keeps handle identity stable: holders of the old handle stay
//! valid and only the driver's internal state resets.

use crate::osal::config::CFG_DEVICE_MAX;
use crate::osal::critical::{critical_section, is_isr_context};
use crate::osal::cs_cell::CsCell;
use crate::osal::error::{Error, Result};
use crate::osal::sched;
use crate::hal::device::{Descriptor, DeviceConfig, DeviceHandle, DeviceState};

/// Name-keyed device table
pub struct Registry {
    table: CsCell<[Option<&'static Descriptor>; CFG_DEVICE_MAX]>,
}

enum GetStep {
    Done(Result<DeviceHandle>),
    Activate(DeviceConfig),
    WaitGuard,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            table: CsCell::new([None; CFG_DEVICE_MAX]),
        }
    }

    /// Add a descriptor to the table. Must complete before the first `get`.
    ///
    /// A duplicate name is a startup-time contract violation and panics
    /// (fail fast); a full table reports `OutOfMemory`.
    pub fn register(&self, desc: &'static Descriptor) -> Result<()> {
        critical_section(|cs| {
            let table = self.table.get(cs);
            for entry in table.iter().flatten() {
                if entry.name() == desc.name() {
                    panic!("duplicate device name: {}", desc.name());
                }
            }
            let runtime = desc.runtime.get(cs);
            if runtime.state != DeviceState::Unregistered {
                return Err(Error::AlreadyInit);
            }
            for entry in table.iter_mut() {
                if entry.is_none() {
                    *entry = Some(desc);
                    runtime.state = DeviceState::Inactive;
                    crate::trace!("device {} registered", desc.name());
                    return Ok(());
                }
            }
            Err(Error::OutOfMemory)
        })
    }

    /// Look a descriptor up by name; never activates, never touches the
    /// reference count.
    pub fn find(&self, name: &str) -> Result<&'static Descriptor> {
        critical_section(|cs| {
            self.table
                .get(cs)
                .iter()
                .flatten()
                .find(|desc| desc.name() == name)
                .copied()
                .ok_or(Error::NotFound)
        })
    }

    /// Acquire a reference to a device, activating it on the 0→1 transition.
    ///
    /// Concurrent callers racing on an inactive device run `init` exactly
    /// once; losers wait on the per-descriptor guard and then take the
    /// cached handle. At the reference bound the call reports `Full`
    /// without incrementing.
    pub fn get(&self, name: &str) -> Result<DeviceHandle> {
        let desc = self.find(name)?;

        loop {
            let step = critical_section(|cs| {
                let runtime = desc.runtime.get(cs);
                if runtime.initializing {
                    return GetStep::WaitGuard;
                }
                if runtime.ref_count > 0 {
                    if Descriptor::at_ref_limit(runtime.ref_count) {
                        return GetStep::Done(Err(Error::Full));
                    }
                    runtime.ref_count += 1;
                    return GetStep::Done(Ok(DeviceHandle { desc }));
                }
                if is_isr_context() {
                    // Activation calls the driver; not allowed from an ISR
                    return GetStep::Done(Err(Error::IsrContext));
                }
                runtime.initializing = true;
                GetStep::Activate(runtime.config.unwrap_or(desc.default_config()))
            });

            match step {
                GetStep::Done(result) => return result,
                GetStep::WaitGuard => {
                    if is_isr_context() {
                        return Err(Error::Busy);
                    }
                    sched::yield_now();
                }
                GetStep::Activate(config) => {
                    let outcome = desc.driver().init(config);
                    return critical_section(|cs| {
                        let runtime = desc.runtime.get(cs);
                        runtime.initializing = false;
                        match outcome {
                            Ok(()) => {
                                runtime.ref_count = 1;
                                runtime.state = DeviceState::Active;
                                crate::debug!("device {} active", desc.name());
                                Ok(DeviceHandle { desc })
                            }
                            // Failed activation leaves ref_count 0 and the
                            // state unchanged: no partial activation.
                            Err(e) => Err(e),
                        }
                    });
                }
            }
        }
    }

    /// Drop a reference, deactivating the device on the 1→0 transition
    pub fn put(&self, handle: DeviceHandle) -> Result<()> {
        let desc = handle.desc;

        let deactivate = critical_section(|cs| {
            let runtime = desc.runtime.get(cs);
            if runtime.initializing {
                return Err(Error::Busy);
            }
            if runtime.ref_count == 0 {
                return Err(Error::InvalidState);
            }
            if runtime.ref_count == 1 && is_isr_context() {
                // The 1->0 transition calls the driver; not allowed from
                // an ISR
                return Err(Error::IsrContext);
            }
            runtime.ref_count -= 1;
            if runtime.ref_count > 0 {
                return Ok(false);
            }
            if runtime.state == DeviceState::Error {
                // Driver already deinitialized by a failed reinit
                return Ok(false);
            }
            runtime.initializing = true;
            Ok(true)
        })?;

        if !deactivate {
            return Ok(());
        }

        let outcome = desc.driver().deinit();
        critical_section(|cs| {
            let runtime = desc.runtime.get(cs);
            runtime.initializing = false;
            match outcome {
                Ok(()) => {
                    runtime.state = DeviceState::Inactive;
                    crate::debug!("device {} inactive", desc.name());
                    Ok(())
                }
                Err(e) => {
                    runtime.state = DeviceState::Error;
                    crate::error!("device {} deinit failed", desc.name());
                    Err(e)
                }
            }
        })
    }

    /// Restart an active device with a new configuration.
    ///
    /// Valid only while `ref_count >= 1`. Performs deinit, applies the new
    /// configuration, then init; the reference count and handle identity
    /// are preserved.
    pub fn reinit(&self, desc: &'static Descriptor, new_config: DeviceConfig) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }

        critical_section(|cs| {
            let runtime = desc.runtime.get(cs);
            if runtime.initializing {
                return Err(Error::Busy);
            }
            if runtime.ref_count == 0 {
                return Err(Error::InvalidState);
            }
            runtime.initializing = true;
            Ok(())
        })?;

        let outcome = desc.driver().deinit().and_then(|()| {
            critical_section(|cs| {
                desc.runtime.get(cs).config = Some(new_config);
            });
            desc.driver().init(new_config)
        });

        critical_section(|cs| {
            let runtime = desc.runtime.get(cs);
            runtime.initializing = false;
            match outcome {
                Ok(()) => {
                    runtime.state = DeviceState::Active;
                    crate::debug!("device {} reinitialized", desc.name());
                    Ok(())
                }
                Err(e) => {
                    runtime.state = DeviceState::Error;
                    crate::error!("device {} reinit failed", desc.name());
                    Err(e)
                }
            }
        })
    }

    /// Move an active device to the suspended state via the driver's
    /// `suspend` op. References stay valid; `get`/`put` keep counting.
    pub fn suspend(&self, handle: DeviceHandle) -> Result<()> {
        self.power_transition(handle, DeviceState::Active, DeviceState::Suspended)
    }

    /// Resume a suspended device
    pub fn resume(&self, handle: DeviceHandle) -> Result<()> {
        self.power_transition(handle, DeviceState::Suspended, DeviceState::Active)
    }

    fn power_transition(
        &self,
        handle: DeviceHandle,
        from: DeviceState,
        to: DeviceState,
    ) -> Result<()> {
        if is_isr_context() {
            return Err(Error::IsrContext);
        }
        let desc = handle.desc;

        critical_section(|cs| {
            let runtime = desc.runtime.get(cs);
            if runtime.initializing {
                return Err(Error::Busy);
            }
            if runtime.ref_count == 0 || runtime.state != from {
                return Err(Error::InvalidState);
            }
            runtime.initializing = true;
            Ok(())
        })?;

        let outcome = match to {
            DeviceState::Suspended => desc.driver().suspend(),
            _ => desc.driver().resume(),
        };

        critical_section(|cs| {
            let runtime = desc.runtime.get(cs);
            runtime.initializing = false;
            if outcome.is_ok() {
                runtime.state = to;
            }
            outcome
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Process-wide instance ============

/// The process-wide registry
pub static REGISTRY: Registry = Registry::new();

/// Register a descriptor with the process-wide registry
pub fn register(desc: &'static Descriptor) -> Result<()> {
    REGISTRY.register(desc)
}

/// Acquire a device from the process-wide registry
pub fn get(name: &str) -> Result<DeviceHandle> {
    REGISTRY.get(name)
}

/// Release a device reference to the process-wide registry
pub fn put(handle: DeviceHandle) -> Result<()> {
    REGISTRY.put(handle)
}

/// Lookup without side effects in the process-wide registry
pub fn find(name: &str) -> Result<&'static Descriptor> {
    REGISTRY.find(name)
}

/// Reconfigure an active device in the process-wide registry
pub fn reinit(desc: &'static Descriptor, new_config: DeviceConfig) -> Result<()> {
    REGISTRY.reinit(desc, new_config)
}
