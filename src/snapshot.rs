//! Point-in-time view of connected controllers.
//!
//! [`Snapshot`] is an **owned**, read-only copy of the registry, republished by the
//! polling thread at the end of every tick that changed something. It's what
//! [`EngineHandle::controllers`](crate::engine::EngineHandle::controllers) returns,
//! so other threads can inspect devices without touching the registry itself.
//!
//! # Semantics
//! - Controllers are ordered by ascending id.
//! - `state` is the last raw bitmask observed for each controller.
//! - A snapshot never changes; ask the handle again for a newer one.
//!
//! # Example
//! ```no_run
//! use padwatch::{backends::virtual_input::VirtualPort, Engine, EngineConfig};
//!
//! let engine = Engine::new(VirtualPort::new(), EngineConfig::default());
//! let handle = engine.handle();
//! for c in handle.controllers().iter() {
//!     println!("{c}: state={:#010x}", c.state);
//! }
//! ```

use crate::controller::Controller;
use crate::device::DeviceId;
use crate::error::Result;
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot(pub Vec<Controller>);

impl Snapshot {
    /// Controller with the given id, if connected at snapshot time.
    #[inline]
    pub fn get(&self, id: DeviceId) -> Option<&Controller> {
        self.0.iter().find(|c| c.id == id)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Controller> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn into_inner(self) -> Vec<Controller> {
        self.0
    }

    /// JSON array of controllers, for diagnostics and tooling.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Controller;
    type IntoIter = std::slice::Iter<'a, Controller>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
