//! Device catalog: normalization of the raw device list and ownership of the
//! selected device id.
//!
//! Normalization keeps only recognized peripheral kinds, rewrites legacy
//! kinds (`mouse`) to sensor-qualified labels (`mouse_sensor`), suffixes the
//! display name with " Sensor" and drops duplicate ids. Running it twice
//! yields the same list.

use crate::error::SchedulerError;
use crate::models::{Device, DeviceKind, RawDevice};
use std::collections::HashSet;
use tracing::debug;

const SENSOR_SUFFIX: &str = " Sensor";

/// Normalize one raw record; `None` when the kind is not monitorable
pub fn normalize_device(raw: &RawDevice) -> Option<Device> {
    let kind = DeviceKind::from_label(&raw.device_type)?;

    let base_name = if raw.name.trim().is_empty() {
        raw.client_id.as_str()
    } else {
        raw.name.as_str()
    };
    let display_name = if base_name.contains("Sensor") {
        base_name.to_string()
    } else {
        format!("{base_name}{SENSOR_SUFFIX}")
    };

    Some(Device {
        id: raw.client_id.clone(),
        display_name,
        kind,
        device_type: kind.label().to_string(),
        status: raw.status.clone(),
    })
}

/// Filter, normalize and deduplicate a catalog response, keeping server order
pub fn normalize_devices(raw: &[RawDevice]) -> Vec<Device> {
    let mut seen = HashSet::new();
    let mut devices = Vec::with_capacity(raw.len());

    for record in raw {
        let Some(device) = normalize_device(record) else {
            debug!("Skipping unmonitorable device {} ({})", record.client_id, record.device_type);
            continue;
        };
        if !seen.insert(device.id.clone()) {
            debug!("Skipping duplicate device id {}", device.id);
            continue;
        }
        devices.push(device);
    }

    devices
}

/// Outcome of a catalog replacement or explicit selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Changed {
        previous: Option<String>,
        current: Option<String>,
    },
}

impl SelectionChange {
    pub fn is_changed(&self) -> bool {
        matches!(self, SelectionChange::Changed { .. })
    }
}

/// Known devices plus the currently selected id
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    devices: Vec<Device>,
    selected: Option<String>,
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_device(&self) -> Option<&Device> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    /// Replace the device set and reconcile the selection:
    /// a vanished selection falls back to the first device (or none),
    /// an empty selection picks the first device when one exists.
    pub fn replace(&mut self, devices: Vec<Device>) -> SelectionChange {
        self.devices = devices;

        let previous = self.selected.clone();
        let keep = previous.as_deref().is_some_and(|id| self.contains(id));
        if !keep {
            self.selected = self.devices.first().map(|d| d.id.clone());
        }

        if self.selected == previous {
            SelectionChange::Unchanged
        } else {
            SelectionChange::Changed {
                previous,
                current: self.selected.clone(),
            }
        }
    }

    /// Explicit selection from the user; `None` clears it
    pub fn select(&mut self, id: Option<&str>) -> Result<SelectionChange, SchedulerError> {
        if let Some(id) = id {
            if !self.contains(id) {
                return Err(SchedulerError::UnknownDevice(id.to_string()));
            }
        }

        let next = id.map(str::to_string);
        if next == self.selected {
            return Ok(SelectionChange::Unchanged);
        }

        let previous = std::mem::replace(&mut self.selected, next);
        Ok(SelectionChange::Changed {
            previous,
            current: self.selected.clone(),
        })
    }
}
