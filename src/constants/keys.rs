// Driver configuration keys, as named in the device service configuration
pub const COAP_BIND_ADDR: &str = "CoapBindAddr";
pub const SECURITY_MODE: &str = "SecurityMode";
pub const PSK_KEY: &str = "PskKey";
