pub const DATA_DIR: &str = "DATA_DIR";
pub const SNAP_COMMON: &str = "SNAP_COMMON";

pub const LOG_LEVEL: &str = "LOG_LEVEL";

pub const COAP_BIND_ADDR: &str = "COAP_BIND_ADDR";
pub const COAP_SECURITY_MODE: &str = "COAP_SECURITY_MODE";
pub const COAP_PSK_KEY: &str = "COAP_PSK_KEY";
pub const COAP_PORT: &str = "COAP_PORT";

pub const DEVICE_REGISTRY: &str = "DEVICE_REGISTRY";

pub const MQTT_BRIDGE_HOST: &str = "MQTT_BRIDGE_HOST";
pub const MQTT_BRIDGE_PORT: &str = "MQTT_BRIDGE_PORT";
pub const MQTT_TOPIC_PREFIX: &str = "MQTT_TOPIC_PREFIX";
