use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use device_coap::data_mgmt::decode::Decoder;
use device_coap::driver::registry_path;
use device_coap::interfaces::FileRegistry;
use device_coap::server::router::RESOURCE_SEG1;

/// Print every routable path with its value type
pub fn check_registry(registry: Option<PathBuf>) -> Result<()> {
    let path = registry.unwrap_or_else(registry_path);
    let registry = FileRegistry::load(&path)
        .with_context(|| format!("Cannot load device registry {}", path.display()))?;

    for device in registry.devices() {
        // The first profile declaring a resource name wins
        let mut seen = HashSet::new();
        for resource in device.profiles.iter().flat_map(|p| p.resources.iter()) {
            if !seen.insert(resource.name.as_str()) {
                log::warn!(
                    "{}/{}: shadowed by an earlier profile",
                    device.name,
                    resource.name
                );
                continue;
            }
            if Decoder::for_kind(resource.value_type).is_none() {
                log::warn!(
                    "{}/{}: no decoder for {}",
                    device.name,
                    resource.name,
                    resource.value_type
                );
            }
            println!(
                "{RESOURCE_SEG1}/{}/{} {}",
                device.name, resource.name, resource.value_type
            );
        }
    }
    Ok(())
}
