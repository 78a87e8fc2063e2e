//! `hidapi`-backed device layer.
//!
//! [`HidPort`] exposes Generic Desktop joystick/gamepad interfaces (usage page
//! `0x01`, usage `0x04`/`0x05`) as a [`DeviceQuery`].
//!
//! - Ids are assigned per connection: a new HID path gets the lowest free id. An id
//!   whose path disappears is released, but not handed out again by the same
//!   enumeration, so the engine always sees it absent once before it is reused.
//! - GUIDs follow SDL's 16-byte layout (bus, vendor, product, version; all
//!   little-endian), with the CRC and driver bytes left at zero.
//! - The button bitmask is read from a fixed slice of the most recent input report,
//!   described by a [`ReportLayout`]. Devices are opened non-blocking on first read
//!   and at most [`MAX_REPORTS_PER_TICK`] reports are drained per tick.
//!
//! This port does not parse HID report descriptors. Devices whose buttons are not
//! byte-aligned in their report need a dedicated port.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::CString;

use hidapi::{DeviceInfo, HidApi, HidDevice};
use tracing::{debug, warn};

use crate::device::{DeviceId, DeviceQuery};
use crate::error::{Error, Result};

/// Maximum number of HID reports drained per `device_state` call.
///
/// Keeps one chatty device from starving the rest of the tick.
pub const MAX_REPORTS_PER_TICK: usize = 32;

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_JOYSTICK: u16 = 0x04;
const USAGE_GAMEPAD: u16 = 0x05;
const BUS_USB: u16 = 0x0003;

/// Where the button bits sit in an input report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportLayout {
    /// Byte offset of the first button byte (count the report-id byte if present).
    pub offset: usize,
    /// Number of little-endian button bytes, `1..=4`.
    pub bytes: usize,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            offset: 0,
            bytes: 4,
        }
    }
}

impl ReportLayout {
    /// Extract the button bitmask, or `None` if the report is too short.
    pub fn extract(&self, report: &[u8]) -> Option<u32> {
        let bytes = self.bytes.clamp(1, 4);
        let end = self.offset.checked_add(bytes)?;
        let field = report.get(self.offset..end)?;
        Some(
            field
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, b)| acc | (u32::from(*b) << (8 * i))),
        )
    }
}

/// SDL-layout GUID string for a USB device.
pub fn sdl_guid(vendor: u16, product: u16, version: u16) -> String {
    let words = [BUS_USB, 0, vendor, 0, product, 0, version, 0];
    words
        .iter()
        .map(|w| {
            let [lo, hi] = w.to_le_bytes();
            format!("{lo:02x}{hi:02x}")
        })
        .collect()
}

struct Slot {
    path: CString,
    name: String,
    guid: String,
    handle: Option<HidDevice>,
    buf: Vec<u8>,
    state: u32,
}

#[derive(Clone)]
struct Candidate {
    path: CString,
    name: String,
    guid: String,
}

impl Candidate {
    fn from_info(info: &DeviceInfo) -> Self {
        Self {
            path: info.path().to_owned(),
            name: info.product_string().unwrap_or("Unknown").to_string(),
            guid: sdl_guid(info.vendor_id(), info.product_id(), info.release_number()),
        }
    }
}

fn is_game_controller(info: &DeviceInfo) -> bool {
    info.usage_page() == USAGE_PAGE_GENERIC_DESKTOP
        && matches!(info.usage(), USAGE_JOYSTICK | USAGE_GAMEPAD)
}

/// Lowest id neither in use nor released by the current enumeration.
fn free_id<T>(slots: &BTreeMap<DeviceId, T>, released: &BTreeSet<DeviceId>) -> DeviceId {
    (0..DeviceId::MAX)
        .find(|id| !slots.contains_key(id) && !released.contains(id))
        .unwrap_or(DeviceId::MAX)
}

/// [`DeviceQuery`] over `hidapi`.
pub struct HidPort {
    api: Option<HidApi>,
    layout: ReportLayout,
    slots: BTreeMap<DeviceId, Slot>,
    pending: Option<Vec<Candidate>>,
}

impl HidPort {
    pub fn new(layout: ReportLayout) -> Self {
        Self {
            api: None,
            layout,
            slots: BTreeMap::new(),
            pending: None,
        }
    }

    fn api(&mut self) -> Result<&mut HidApi> {
        self.api
            .as_mut()
            .ok_or_else(|| Error::query("hid", "device layer not initialized"))
    }

    fn scan(&mut self) -> Result<Vec<Candidate>> {
        let api = self.api()?;
        api.refresh_devices()
            .map_err(|e| Error::query("refresh_devices", e))?;
        let mut seen = BTreeSet::new();
        Ok(api
            .device_list()
            .filter(|info| is_game_controller(info))
            .filter(|info| seen.insert(info.path().to_owned()))
            .map(Candidate::from_info)
            .collect())
    }

    fn slot(&mut self, id: DeviceId) -> Result<&mut Slot> {
        self.slots.get_mut(&id).ok_or(Error::DeviceUnavailable(id))
    }
}

impl Default for HidPort {
    fn default() -> Self {
        Self::new(ReportLayout::default())
    }
}

impl DeviceQuery for HidPort {
    fn initialize(&mut self) -> Result<()> {
        let api = HidApi::new().map_err(|e| Error::Initialization(e.to_string()))?;
        self.api = Some(api);
        self.slots.clear();
        self.pending = None;
        Ok(())
    }

    fn terminate(&mut self) {
        self.slots.clear();
        self.pending = None;
        self.api = None;
    }

    fn has_device_list_changed(&mut self) -> bool {
        let found = match self.scan() {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "hid scan failed");
                return false;
            }
        };
        let now: BTreeSet<&CString> = found.iter().map(|c| &c.path).collect();
        let known: BTreeSet<&CString> = self.slots.values().map(|s| &s.path).collect();
        let changed = now != known;
        if changed {
            self.pending = Some(found);
        }
        changed
    }

    fn list_device_ids(&mut self) -> Result<Vec<DeviceId>> {
        let found = match self.pending.take() {
            Some(found) => found,
            None => self.scan()?,
        };
        let present: BTreeSet<&CString> = found.iter().map(|c| &c.path).collect();
        let mut released = BTreeSet::new();
        self.slots.retain(|id, slot| {
            let keep = present.contains(&&slot.path);
            if !keep {
                debug!(id, path = ?slot.path, "hid device gone");
                released.insert(*id);
            }
            keep
        });

        for cand in &found {
            if self.slots.values().any(|s| s.path == cand.path) {
                continue;
            }
            let id = free_id(&self.slots, &released);
            debug!(id, path = ?cand.path, name = %cand.name, "hid device assigned");
            self.slots.insert(
                id,
                Slot {
                    path: cand.path.clone(),
                    name: cand.name.clone(),
                    guid: cand.guid.clone(),
                    handle: None,
                    buf: vec![0u8; 64],
                    state: 0,
                },
            );
        }
        Ok(self.slots.keys().copied().collect())
    }

    fn device_name(&mut self, id: DeviceId) -> Result<String> {
        Ok(self.slot(id)?.name.clone())
    }

    fn device_guid(&mut self, id: DeviceId) -> Result<String> {
        Ok(self.slot(id)?.guid.clone())
    }

    fn device_state(&mut self, id: DeviceId) -> Result<u32> {
        let layout = self.layout;
        let needs_open = self.slot(id)?.handle.is_none();
        if needs_open {
            let path = self.slot(id)?.path.clone();
            let device = self
                .api()?
                .open_path(&path)
                .map_err(|e| Error::query("open_path", e))?;
            let _ = device.set_blocking_mode(false);
            self.slot(id)?.handle = Some(device);
        }

        let slot = self.slot(id)?;
        let mut drained = 0;
        while drained < MAX_REPORTS_PER_TICK {
            let Some(device) = slot.handle.as_ref() else {
                break;
            };
            match device.read(&mut slot.buf) {
                Ok(0) => break,
                Ok(n) => {
                    drained += 1;
                    if let Some(bits) = layout.extract(&slot.buf[..n]) {
                        slot.state = bits;
                    }
                }
                Err(e) => {
                    // reopen on the next tick
                    slot.handle = None;
                    return Err(Error::query("read", e));
                }
            }
        }
        Ok(slot.state)
    }
}
