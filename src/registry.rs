//! Identity registry: the set of currently connected controllers.
//!
//! Only the polling thread touches a [`Registry`], so it holds plain owned data.
//!
//! Reconciliation runs when the port reports that its device list changed. The
//! whole pass (onboarding and offboarding) is applied to the registry before the
//! caller dispatches anything, so listeners never observe a half-reconciled set
//! or a controller whose name/GUID are still unresolved.
//!
//! The registry is only mutated once every port query of a pass has returned. A
//! pass aborted by a panicking port leaves it exactly as it was.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::controller::{Controller, UNDEFINED_NAME};
use crate::device::{DeviceId, DeviceQuery};
use crate::diff::{diff, Edges};

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Newly onboarded ids, ascending. Their identities are in the registry.
    pub connected: Vec<DeviceId>,
    /// Removed identities, ascending by id. No longer mutated.
    pub disconnected: Vec<Controller>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.connected.is_empty() && self.disconnected.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    controllers: BTreeMap<DeviceId, Controller>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn get(&self, id: DeviceId) -> Option<&Controller> {
        self.controllers.get(&id)
    }

    /// Tracked ids, ascending.
    pub fn ids(&self) -> Vec<DeviceId> {
        self.controllers.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Controller> {
        self.controllers.values()
    }

    /// Bring the registry in line with `current_ids`.
    ///
    /// New ids are onboarded with their GUID and display name already resolved;
    /// query failures degrade to `"Undefined"`. Ids no longer listed are removed.
    pub fn reconcile<Q: DeviceQuery + ?Sized>(
        &mut self,
        current_ids: &[DeviceId],
        port: &mut Q,
        config: &EngineConfig,
    ) -> Reconciliation {
        let listed: BTreeSet<DeviceId> = current_ids.iter().copied().collect();
        let onboarded: Vec<Controller> = listed
            .iter()
            .copied()
            .filter(|id| !self.controllers.contains_key(id))
            .map(|id| onboard(id, port, config))
            .collect();

        let mut out = Reconciliation::default();

        let gone: Vec<DeviceId> = self
            .controllers
            .keys()
            .filter(|id| !listed.contains(id))
            .copied()
            .collect();
        for id in gone {
            if let Some(controller) = self.controllers.remove(&id) {
                debug!(id, name = %controller.name, "offboarded controller");
                out.disconnected.push(controller);
            }
        }
        for controller in onboarded {
            debug!(id = controller.id, guid = %controller.guid, name = %controller.name, "onboarded controller");
            out.connected.push(controller.id);
            self.controllers.insert(controller.id, controller);
        }

        out
    }

    /// Store a new raw sample for `id` and return the edges against the previous one.
    ///
    /// The stored state is replaced even when nothing changed. Returns `None` for
    /// an untracked id.
    pub fn apply_state(&mut self, id: DeviceId, current: u32) -> Option<Edges> {
        let controller = self.controllers.get_mut(&id)?;
        let edges = diff(controller.state, current);
        controller.state = current;
        Some(edges)
    }
}

fn onboard<Q: DeviceQuery + ?Sized>(id: DeviceId, port: &mut Q, config: &EngineConfig) -> Controller {
    let guid = port.device_guid(id).unwrap_or_else(|e| {
        warn!(id, error = %e, "guid lookup failed");
        UNDEFINED_NAME.to_string()
    });
    // the device layer is only asked when no override exists
    let name = if config.name_overrides.contains_key(&guid) {
        config.resolve_name(&guid, None)
    } else {
        let reported = port
            .device_name(id)
            .map_err(|e| warn!(id, error = %e, "name lookup failed"))
            .ok();
        config.resolve_name(&guid, reported)
    };
    Controller::new(id, guid, name)
}
