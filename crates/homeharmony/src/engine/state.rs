use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::Catalog;

/// On/off state of every catalog device.
///
/// Every device has an explicit entry from construction onwards, so a lookup
/// for an id outside the catalog is distinguishable from "off".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct DeviceStates {
    states: BTreeMap<String, bool>,
}

impl DeviceStates {
    /// All devices off
    pub fn for_catalog(catalog: &Catalog) -> Self {
        Self {
            states: catalog.iter().map(|d| (d.id.clone(), false)).collect(),
        }
    }

    /// `None` when `device_id` is not a catalog device
    pub fn get(&self, device_id: &str) -> Option<bool> {
        self.states.get(device_id).copied()
    }

    pub fn is_on(&self, device_id: &str) -> bool {
        self.get(device_id).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.states.iter().map(|(id, on)| (id.as_str(), *on))
    }

    pub(super) fn set(&mut self, device_id: &str, on: bool) {
        if let Some(state) = self.states.get_mut(device_id) {
            *state = on;
        }
    }
}
