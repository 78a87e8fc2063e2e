//! In-memory device layer.
//!
//! [`VirtualPort`] implements [`DeviceQuery`] over a scripted set of devices. Clones
//! share the same state, so one clone can be handed to the engine while another
//! plugs, unplugs and presses buttons from the test or demo thread.
//!
//! Faults can be injected per operation to exercise the engine's degradation
//! paths: initialization failure, failed list refresh, failed name or state reads,
//! and one-shot panics inside a query.
//!
//! An id that is unplugged (or plugged over) is left out of the next
//! [`DeviceQuery::list_device_ids`] result even when a new device already holds
//! it; the new device is listed from the following call on.

use crate::device::{DeviceId, DeviceQuery};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct VirtualDevice {
    guid: String,
    name: String,
    state: u32,
    fail_name: bool,
    fail_state: bool,
    panic_guid: bool,
    panic_state: bool,
}

impl VirtualDevice {
    fn new(guid: &str, name: &str) -> Self {
        Self {
            guid: guid.to_string(),
            name: name.to_string(),
            state: 0,
            fail_name: false,
            fail_state: false,
            panic_guid: false,
            panic_state: false,
        }
    }
}

#[derive(Debug, Default)]
struct VirtualState {
    devices: BTreeMap<DeviceId, VirtualDevice>,
    /// Ids that lost their device since the last successful enumeration.
    released: BTreeSet<DeviceId>,
    dirty: bool,
    fail_initialize: bool,
    failing_lists: usize,
    initialize_calls: usize,
    terminate_calls: usize,
    list_calls: usize,
    state_calls: usize,
}

/// Scriptable [`DeviceQuery`] implementation.
#[derive(Clone, Debug, Default)]
pub struct VirtualPort {
    inner: Arc<Mutex<VirtualState>>,
}

impl VirtualPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a device. Plugging over an existing `id` unplugs the old device first.
    pub fn plug(&self, id: DeviceId, guid: &str, name: &str) {
        let mut s = self.inner.lock();
        if s.devices.insert(id, VirtualDevice::new(guid, name)).is_some() {
            s.released.insert(id);
        }
        s.dirty = true;
    }

    pub fn unplug(&self, id: DeviceId) {
        let mut s = self.inner.lock();
        if s.devices.remove(&id).is_some() {
            s.released.insert(id);
            s.dirty = true;
        }
    }

    /// Overwrite the raw bitmask reported for `id`.
    pub fn set_state(&self, id: DeviceId, bits: u32) {
        if let Some(d) = self.inner.lock().devices.get_mut(&id) {
            d.state = bits;
        }
    }

    pub fn press_button(&self, id: DeviceId, bit: u8) {
        if let Some(d) = self.inner.lock().devices.get_mut(&id) {
            d.state |= 1 << (bit & 31);
        }
    }

    pub fn release_button(&self, id: DeviceId, bit: u8) {
        if let Some(d) = self.inner.lock().devices.get_mut(&id) {
            d.state &= !(1 << (bit & 31));
        }
    }

    /// Make `initialize()` fail until cleared.
    pub fn fail_initialize(&self, fail: bool) {
        self.inner.lock().fail_initialize = fail;
    }

    /// Make the next `n` calls to `list_device_ids()` fail.
    pub fn fail_next_lists(&self, n: usize) {
        self.inner.lock().failing_lists = n;
    }

    pub fn fail_name(&self, id: DeviceId, fail: bool) {
        if let Some(d) = self.inner.lock().devices.get_mut(&id) {
            d.fail_name = fail;
        }
    }

    pub fn fail_state(&self, id: DeviceId, fail: bool) {
        if let Some(d) = self.inner.lock().devices.get_mut(&id) {
            d.fail_state = fail;
        }
    }

    /// Make the next `device_guid(id)` call panic.
    pub fn panic_on_guid(&self, id: DeviceId) {
        if let Some(d) = self.inner.lock().devices.get_mut(&id) {
            d.panic_guid = true;
        }
    }

    /// Make the next `device_state(id)` call panic.
    pub fn panic_on_state(&self, id: DeviceId) {
        if let Some(d) = self.inner.lock().devices.get_mut(&id) {
            d.panic_state = true;
        }
    }

    pub fn initialize_calls(&self) -> usize {
        self.inner.lock().initialize_calls
    }

    pub fn terminate_calls(&self) -> usize {
        self.inner.lock().terminate_calls
    }

    pub fn list_calls(&self) -> usize {
        self.inner.lock().list_calls
    }

    /// Number of `device_state` calls, failed ones included.
    pub fn state_calls(&self) -> usize {
        self.inner.lock().state_calls
    }

    fn with_device<T>(&self, id: DeviceId, f: impl FnOnce(&mut VirtualDevice) -> Result<T>) -> Result<T> {
        let mut s = self.inner.lock();
        let d = s.devices.get_mut(&id).ok_or(Error::DeviceUnavailable(id))?;
        f(d)
    }
}

impl DeviceQuery for VirtualPort {
    fn initialize(&mut self) -> Result<()> {
        let mut s = self.inner.lock();
        s.initialize_calls += 1;
        if s.fail_initialize {
            return Err(Error::Initialization(
                "virtual device layer unavailable".into(),
            ));
        }
        s.dirty = true;
        Ok(())
    }

    fn terminate(&mut self) {
        self.inner.lock().terminate_calls += 1;
    }

    fn has_device_list_changed(&mut self) -> bool {
        std::mem::take(&mut self.inner.lock().dirty)
    }

    fn list_device_ids(&mut self) -> Result<Vec<DeviceId>> {
        let mut s = self.inner.lock();
        s.list_calls += 1;
        if s.failing_lists > 0 {
            s.failing_lists -= 1;
            return Err(Error::query("list_device_ids", "injected failure"));
        }
        let released = std::mem::take(&mut s.released);
        let (held, listed): (Vec<DeviceId>, Vec<DeviceId>) =
            s.devices.keys().copied().partition(|id| released.contains(id));
        if !held.is_empty() {
            s.dirty = true;
        }
        Ok(listed)
    }

    fn device_name(&mut self, id: DeviceId) -> Result<String> {
        self.with_device(id, |d| {
            if d.fail_name {
                Err(Error::query("device_name", "injected failure"))
            } else {
                Ok(d.name.clone())
            }
        })
    }

    fn device_guid(&mut self, id: DeviceId) -> Result<String> {
        self.with_device(id, |d| {
            if std::mem::take(&mut d.panic_guid) {
                panic!("injected panic in device_guid({id})");
            }
            Ok(d.guid.clone())
        })
    }

    fn device_state(&mut self, id: DeviceId) -> Result<u32> {
        self.inner.lock().state_calls += 1;
        self.with_device(id, |d| {
            if std::mem::take(&mut d.panic_state) {
                panic!("injected panic in device_state({id})");
            }
            if d.fail_state {
                Err(Error::query("device_state", "injected failure"))
            } else {
                Ok(d.state)
            }
        })
    }
}
