use std::time::Duration;

pub const LOG_LEVEL: &str = "info";

pub const COAP_BIND_ADDR: &str = "0.0.0.0";
pub const SECURITY_MODE: &str = "NoSec";
pub const PSK_KEY: &str = "";

pub const COAP_PORT: u16 = 5683;
pub const COAPS_PORT: u16 = 5684;

/// Upper bound on a single wait for socket readiness; the stop flag is
/// checked between waits.
pub const IO_WAIT: Duration = Duration::from_secs(1);

pub const REGISTRY_FILE: &str = "devices.json";

pub const MQTT_BRIDGE_HOST: &str = "localhost";
pub const MQTT_BRIDGE_PORT: u16 = 1883;
