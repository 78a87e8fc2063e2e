//! Push-fed device layer.
//!
//! Some native layers deliver input through a callback instead of answering
//! queries. [`CallbackPort`] bridges them: the native side holds a
//! [`CallbackSink`] and pushes `(controller, code, value)` triples from whatever
//! thread it likes, while the engine polls the port like any other.
//!
//! | code | meaning |
//! |---|---|
//! | `0..=31` | button bit, pressed while `value > 0` |
//! | [`CODE_CONNECTION`] | controller connected (`value > 0`) or disconnected |
//! | [`CODE_HAT_CENTERED`] | directional hat back to centre |
//! | `101..=104` | hat up, right, down, left |
//!
//! Hat directions are exclusive: a new direction replaces the held one, and
//! centring releases it. Other codes are logged and dropped.
//!
//! Pushes only update the latest sample. A press and release that both land
//! between two ticks are not seen by the engine.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::device::{DeviceId, DeviceQuery};
use crate::error::{Error, Result};

/// Code carrying connect/disconnect.
pub const CODE_CONNECTION: u32 = 50;
/// Code releasing the held hat direction.
pub const CODE_HAT_CENTERED: u32 = 100;

/// Bits set for hat up, right, down and left. Matches the default button table.
pub const DEFAULT_HAT_BITS: [u8; 4] = [11, 14, 12, 13];

#[derive(Debug, Default)]
struct Pad {
    guid: Option<String>,
    name: Option<String>,
    connected: bool,
    buttons: u32,
    /// Index into the hat bit table.
    hat: Option<usize>,
}

#[derive(Debug)]
struct Feed {
    pads: BTreeMap<DeviceId, Pad>,
    released: BTreeSet<DeviceId>,
    dirty: bool,
    hat_bits: [u8; 4],
}

impl Feed {
    fn pad(&mut self, id: DeviceId) -> &mut Pad {
        self.pads.entry(id).or_default()
    }

    fn push(&mut self, id: DeviceId, code: u32, value: i32) {
        match code {
            CODE_CONNECTION => self.set_connected(id, value > 0),
            CODE_HAT_CENTERED => {
                if let Some(pad) = self.live(id, code) {
                    pad.hat = None;
                }
            }
            101..=104 => {
                if let Some(pad) = self.live(id, code) {
                    pad.hat = Some((code - 101) as usize);
                }
            }
            0..=31 => {
                if let Some(pad) = self.live(id, code) {
                    if value > 0 {
                        pad.buttons |= 1 << code;
                    } else {
                        pad.buttons &= !(1 << code);
                    }
                }
            }
            _ => warn!(id, code, "unsupported controller code dropped"),
        }
    }

    /// Connected pad for an input code, or `None` after logging.
    fn live(&mut self, id: DeviceId, code: u32) -> Option<&mut Pad> {
        match self.pads.get_mut(&id) {
            Some(pad) if pad.connected => Some(pad),
            _ => {
                debug!(id, code, "input for a disconnected controller dropped");
                None
            }
        }
    }

    fn set_connected(&mut self, id: DeviceId, connected: bool) {
        let pad = self.pad(id);
        if pad.connected == connected {
            return;
        }
        pad.connected = connected;
        pad.buttons = 0;
        pad.hat = None;
        if !connected {
            self.released.insert(id);
        }
        self.dirty = true;
    }

    fn state(&self, pad: &Pad) -> u32 {
        let hat = pad
            .hat
            .map_or(0, |i| 1u32 << (self.hat_bits[i] & 31));
        pad.buttons | hat
    }
}

/// Producer side of a [`CallbackPort`]. Cheap to clone and `Send + Sync`.
#[derive(Clone)]
pub struct CallbackSink {
    feed: Arc<Mutex<Feed>>,
}

impl CallbackSink {
    /// Raw callback entry point.
    pub fn push(&self, id: DeviceId, code: u32, value: i32) {
        self.feed.lock().push(id, code, value);
    }

    /// Record the identity reported for `id`. Used for the current and later
    /// connections until replaced.
    pub fn describe(&self, id: DeviceId, guid: &str, name: &str) {
        let mut feed = self.feed.lock();
        let pad = feed.pad(id);
        pad.guid = Some(guid.to_string());
        pad.name = Some(name.to_string());
    }

    pub fn connect(&self, id: DeviceId) {
        self.push(id, CODE_CONNECTION, 1);
    }

    pub fn disconnect(&self, id: DeviceId) {
        self.push(id, CODE_CONNECTION, 0);
    }
}

/// [`DeviceQuery`] over pushed callback codes.
pub struct CallbackPort {
    feed: Arc<Mutex<Feed>>,
}

impl CallbackPort {
    pub fn new() -> Self {
        Self::with_hat_bits(DEFAULT_HAT_BITS)
    }

    /// Port whose hat directions (up, right, down, left) set the given bits.
    pub fn with_hat_bits(hat_bits: [u8; 4]) -> Self {
        Self {
            feed: Arc::new(Mutex::new(Feed {
                pads: BTreeMap::new(),
                released: BTreeSet::new(),
                dirty: false,
                hat_bits,
            })),
        }
    }

    /// Handle for the native callback.
    pub fn sink(&self) -> CallbackSink {
        CallbackSink {
            feed: self.feed.clone(),
        }
    }

    fn with_pad<T>(&self, id: DeviceId, f: impl FnOnce(&Feed, &Pad) -> Result<T>) -> Result<T> {
        let feed = self.feed.lock();
        match feed.pads.get(&id) {
            Some(pad) if pad.connected => f(&feed, pad),
            _ => Err(Error::DeviceUnavailable(id)),
        }
    }
}

impl Default for CallbackPort {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceQuery for CallbackPort {
    fn initialize(&mut self) -> Result<()> {
        self.feed.lock().dirty = true;
        Ok(())
    }

    fn terminate(&mut self) {}

    fn has_device_list_changed(&mut self) -> bool {
        std::mem::take(&mut self.feed.lock().dirty)
    }

    fn list_device_ids(&mut self) -> Result<Vec<DeviceId>> {
        let mut feed = self.feed.lock();
        let released = std::mem::take(&mut feed.released);
        let (held, listed): (Vec<DeviceId>, Vec<DeviceId>) = feed
            .pads
            .iter()
            .filter(|(_, pad)| pad.connected)
            .map(|(id, _)| *id)
            .partition(|id| released.contains(id));
        if !held.is_empty() {
            feed.dirty = true;
        }
        Ok(listed)
    }

    fn device_name(&mut self, id: DeviceId) -> Result<String> {
        self.with_pad(id, |_, pad| {
            pad.name
                .clone()
                .ok_or_else(|| Error::query("device_name", "no name reported"))
        })
    }

    fn device_guid(&mut self, id: DeviceId) -> Result<String> {
        self.with_pad(id, |_, pad| {
            pad.guid
                .clone()
                .ok_or_else(|| Error::query("device_guid", "no guid reported"))
        })
    }

    fn device_state(&mut self, id: DeviceId) -> Result<u32> {
        self.with_pad(id, |feed, pad| Ok(feed.state(pad)))
    }
}
