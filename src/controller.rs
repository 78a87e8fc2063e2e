//! Connected-controller identity.
//!
//! A [`Controller`] is created by the registry once its GUID and display name are
//! resolved, updated every tick with the latest raw bitmask, and dropped when the
//! device layer stops listing its id. Listeners only ever see `&Controller`.
//!
//! # Identity notes
//! - `id` is the device layer's transient handle. It can be reused by a different
//!   device after a disconnect; treat it as a key for the current connection only.
//! - `guid` identifies a hardware model/variant and keys the name-override table.
//!   It does not distinguish two identical controllers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::device::DeviceId;

/// Name used when neither an override nor the device layer provides one.
pub const UNDEFINED_NAME: &str = "Undefined";

/// One physically connected controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    /// Transient device-layer handle.
    pub id: DeviceId,
    /// Stable hardware identifier (may be [`UNDEFINED_NAME`] if the query failed).
    pub guid: String,
    /// Human-readable label.
    pub name: String,
    /// Last observed raw button bitmask.
    pub state: u32,
}

impl Controller {
    /// New identity with a zeroed state.
    pub fn new(id: DeviceId, guid: String, name: String) -> Self {
        Self {
            id,
            guid,
            name,
            state: 0,
        }
    }

    /// Pure bit test against the last observed state.
    #[inline]
    pub fn is_bit_set(&self, bit: u8) -> bool {
        bit < 32 && self.state & (1 << bit) != 0
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{} {})", self.name, self.id, self.guid)
    }
}
