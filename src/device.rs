//! Device Query Port.
//!
//! [`DeviceQuery`] is the only thing the engine knows about hardware. A port wraps
//! whatever native layer actually talks to controllers (SDL, hidapi, a test double)
//! and answers a handful of synchronous questions once per tick.
//!
//! All methods are called from the polling thread only, so ports take `&mut self`
//! and need no internal locking. They must be [`Send`] because the engine moves
//! the port onto its polling thread.
//!
//! # Identity
//! A [`DeviceId`] is assigned by the device layer and is only stable while the
//! device stays connected. Layers are free to hand the same id to a different
//! device after a disconnect, but only once a [`list_device_ids`] result has
//! omitted it: an id that stays listed across two enumerations is taken to be the
//! same device. The engine never keeps an id across a reconciliation pass that
//! dropped it.
//!
//! [`list_device_ids`]: DeviceQuery::list_device_ids

use crate::error::Result;

/// Transient device handle assigned by the device layer.
pub type DeviceId = u32;

/// Abstract capability the engine polls every tick.
pub trait DeviceQuery: Send {
    /// Acquire the underlying device subsystem. Called once, on the polling thread,
    /// before the first tick. An error here is fatal for `start()`.
    fn initialize(&mut self) -> Result<()>;

    /// Release the device subsystem. Called once after the last tick.
    fn terminate(&mut self);

    /// Cheap dirty check, called every tick.
    fn has_device_list_changed(&mut self) -> bool;

    /// Full enumeration. Called when [`has_device_list_changed`](Self::has_device_list_changed)
    /// returned `true`, and again after a failed or aborted refresh.
    ///
    /// An id that was listed by the previous call and whose device has since gone
    /// must be left out of this result even if another device now owns it. The
    /// new owner may be listed from the next call on; ports keep their dirty flag
    /// set so that call happens.
    fn list_device_ids(&mut self) -> Result<Vec<DeviceId>>;

    /// Device-reported display name. Called once per newly onboarded device.
    fn device_name(&mut self, id: DeviceId) -> Result<String>;

    /// Stable hardware identifier. Called once per newly onboarded device.
    fn device_guid(&mut self, id: DeviceId) -> Result<String>;

    /// Raw button bitmask. Called once per tracked device per tick.
    fn device_state(&mut self, id: DeviceId) -> Result<u32>;
}

impl<Q: DeviceQuery + ?Sized> DeviceQuery for Box<Q> {
    fn initialize(&mut self) -> Result<()> {
        (**self).initialize()
    }

    fn terminate(&mut self) {
        (**self).terminate()
    }

    fn has_device_list_changed(&mut self) -> bool {
        (**self).has_device_list_changed()
    }

    fn list_device_ids(&mut self) -> Result<Vec<DeviceId>> {
        (**self).list_device_ids()
    }

    fn device_name(&mut self, id: DeviceId) -> Result<String> {
        (**self).device_name(id)
    }

    fn device_guid(&mut self, id: DeviceId) -> Result<String> {
        (**self).device_guid(id)
    }

    fn device_state(&mut self, id: DeviceId) -> Result<u32> {
        (**self).device_state(id)
    }
}
