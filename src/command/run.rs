use std::path::PathBuf;

use anyhow::{Context, Result};

use device_coap::data_mgmt::publish::MqttPublisher;
use device_coap::driver::{registry_path, DriverConfig};
use device_coap::interfaces::FileRegistry;
use device_coap::server::{RequestHandler, Server};

/// Receive pushed readings until SIGINT or SIGTERM
pub fn run(registry: Option<PathBuf>) -> Result<()> {
    let config = DriverConfig::from_env().inspect_err(|e| log::error!("{e}"))?;
    log::info!("Security mode: {}", config.security_mode);
    log::debug!("{config:?}");

    let registry_path = registry.unwrap_or_else(registry_path);
    let registry = FileRegistry::load(&registry_path)
        .with_context(|| format!("Cannot load device registry {}", registry_path.display()))
        .inspect_err(|e| log::error!("{e:#}"))?;

    let publisher = MqttPublisher::connect().context("Cannot start MQTT client")?;

    let mut server = Server::new(config, RequestHandler::new(registry, publisher));
    server.install_signal_handlers()?;
    server.bind()?;
    server.run()?;

    println!("Exiting gracefully");
    Ok(())
}
