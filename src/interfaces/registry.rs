//! Device registry
//!
//! Devices are looked up by name for the duration of one request. A lookup
//! hands out a [`DeviceLease`], which returns the device to the registry when
//! it goes out of scope.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_mgmt::models::ValueKind;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    pub name: String,
    pub value_type: ValueKind,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DeviceProfile {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ResourceSchema>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Device {
    pub name: String,
    #[serde(default)]
    pub profiles: Vec<DeviceProfile>,
}

impl Device {
    /// Find a resource by name across the device's profile chain
    pub fn find_resource(&self, name: &str) -> Option<&ResourceSchema> {
        self.profiles
            .iter()
            .flat_map(|p| p.resources.iter())
            .find(|r| r.name == name)
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("could not read registry file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse registry JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("duplicate device name '{0}'")]
    DuplicateDevice(String),
}

/// Directory of devices and their resource schemas.
///
/// Every successful [`acquire`](DeviceRegistry::acquire) is paired with exactly
/// one [`release`](DeviceRegistry::release); use [`DeviceLease`] rather than
/// calling these directly.
pub trait DeviceRegistry {
    fn acquire(&self, name: &str) -> Option<Arc<Device>>;
    fn release(&self, device: &Device);
}

/// A device held for the duration of one request
pub struct DeviceLease<'r, R: DeviceRegistry + ?Sized> {
    registry: &'r R,
    device: Arc<Device>,
}

impl<'r, R: DeviceRegistry + ?Sized> DeviceLease<'r, R> {
    pub fn acquire(registry: &'r R, name: &str) -> Option<Self> {
        registry
            .acquire(name)
            .map(|device| DeviceLease { registry, device })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl<R: DeviceRegistry + ?Sized> Drop for DeviceLease<'_, R> {
    fn drop(&mut self) {
        self.registry.release(&self.device);
    }
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    devices: Vec<Device>,
}

/// Registry backed by a JSON document loaded at startup
#[derive(Debug, Default)]
pub struct FileRegistry {
    devices: HashMap<String, Arc<Device>>,
    leases: AtomicUsize,
}

impl FileRegistry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let registry = Self::from_str(&raw)?;
        log::info!(
            "Loaded {} device(s) from {}",
            registry.devices.len(),
            path.as_ref().display()
        );
        Ok(registry)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(raw: &str) -> Result<Self, RegistryError> {
        let doc: RegistryDocument = serde_json::from_str(raw)?;
        Self::from_devices(doc.devices)
    }

    pub fn from_devices(devices: Vec<Device>) -> Result<Self, RegistryError> {
        let mut map = HashMap::with_capacity(devices.len());
        for device in devices {
            if map.contains_key(&device.name) {
                return Err(RegistryError::DuplicateDevice(device.name));
            }
            map.insert(device.name.clone(), Arc::new(device));
        }
        Ok(Self {
            devices: map,
            leases: AtomicUsize::new(0),
        })
    }

    /// Devices sorted by name
    pub fn devices(&self) -> Vec<&Device> {
        let mut devices: Vec<&Device> = self.devices.values().map(|d| d.as_ref()).collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    /// Number of leases handed out and not yet returned
    pub fn outstanding_leases(&self) -> usize {
        self.leases.load(Ordering::Relaxed)
    }
}

impl DeviceRegistry for FileRegistry {
    fn acquire(&self, name: &str) -> Option<Arc<Device>> {
        let device = self.devices.get(name).cloned()?;
        self.leases.fetch_add(1, Ordering::Relaxed);
        Some(device)
    }

    fn release(&self, device: &Device) {
        let released = self
            .leases
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        if released.is_err() {
            log::error!("device {} released without a lease", device.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"
    {
        "devices": [
            {
                "name": "device-1",
                "profiles": [
                    {
                        "name": "thermo",
                        "resources": [
                            { "name": "temp", "valueType": "Float64" },
                            { "name": "count", "valueType": "Int32" }
                        ]
                    },
                    {
                        "name": "labelled",
                        "resources": [ { "name": "label", "valueType": "String" } ]
                    }
                ]
            },
            { "name": "bare" }
        ]
    }
    "#;

    #[test]
    fn test_parse_registry() {
        let registry = FileRegistry::from_str(REGISTRY).unwrap();
        let names: Vec<&str> = registry.devices().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["bare", "device-1"]);
    }

    #[test]
    fn test_find_resource_spans_profiles() {
        let registry = FileRegistry::from_str(REGISTRY).unwrap();
        let lease = DeviceLease::acquire(&registry, "device-1").unwrap();
        let device = lease.device();
        assert_eq!(
            device.find_resource("temp").map(|r| r.value_type),
            Some(ValueKind::Float64)
        );
        assert_eq!(
            device.find_resource("label").map(|r| r.value_type),
            Some(ValueKind::String)
        );
        assert!(device.find_resource("humidity").is_none());
    }

    #[test]
    fn test_lease_released_on_drop() {
        let registry = FileRegistry::from_str(REGISTRY).unwrap();
        {
            let _a = DeviceLease::acquire(&registry, "device-1").unwrap();
            let _b = DeviceLease::acquire(&registry, "bare").unwrap();
            assert_eq!(registry.outstanding_leases(), 2);
        }
        assert_eq!(registry.outstanding_leases(), 0);
    }

    #[test]
    fn test_unknown_device_takes_no_lease() {
        let registry = FileRegistry::from_str(REGISTRY).unwrap();
        assert!(DeviceLease::acquire(&registry, "nope").is_none());
        assert_eq!(registry.outstanding_leases(), 0);
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let raw = r#"{ "devices": [ { "name": "a" }, { "name": "a" } ] }"#;
        assert!(matches!(
            FileRegistry::from_str(raw),
            Err(RegistryError::DuplicateDevice(name)) if name == "a"
        ));
    }

    #[test]
    fn test_unknown_value_type_rejected() {
        let raw = r#"{ "devices": [ { "name": "a", "profiles": [
            { "name": "p", "resources": [ { "name": "r", "valueType": "Decimal" } ] } ] } ] }"#;
        assert!(matches!(
            FileRegistry::from_str(raw),
            Err(RegistryError::ParseJson(_))
        ));
    }
}
