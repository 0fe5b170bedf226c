use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use crate::constants::{defaults, envvars, keys};
use crate::helpers::base_path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityMode {
    NoSec,
    Psk,
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityMode::NoSec => write!(f, "NoSec"),
            SecurityMode::Psk => write!(f, "PSK"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown security mode '{0}'")]
    UnknownSecurityMode(String),
    #[error("PSK key not in configuration")]
    MissingPskKey,
    #[error("PSK key is not valid base64: {0}")]
    InvalidPskKey(#[from] base64::DecodeError),
    #[error("CoAP bind address not in configuration")]
    MissingBindAddr,
    #[error("invalid CoAP port '{0}'")]
    InvalidPort(String),
}

/// Driver settings, validated once at startup
#[derive(Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub security_mode: SecurityMode,
    pub bind_addr: String,
    /// Present exactly when `security_mode` is PSK
    pub psk_key: Option<Vec<u8>>,
    /// Overrides the well-known port of the selected transport
    pub port: Option<u16>,
}

// Keeps the key out of logs
impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverConfig")
            .field("security_mode", &self.security_mode)
            .field("bind_addr", &self.bind_addr)
            .field("psk_key_len", &self.psk_key.as_ref().map(Vec::len))
            .field("port", &self.port)
            .finish()
    }
}

impl DriverConfig {
    /// Build from driver configuration keys (`CoapBindAddr`, `SecurityMode`,
    /// `PskKey`). Missing keys take their defaults.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| {
            map.get(key)
                .map(String::as_str)
                .unwrap_or(default)
                .to_string()
        };

        let security_mode = find_security_mode(&get(keys::SECURITY_MODE, defaults::SECURITY_MODE))?;

        let psk_key = match security_mode {
            SecurityMode::Psk => {
                let key = decode_psk_key(&get(keys::PSK_KEY, defaults::PSK_KEY))?;
                log::info!("PSK key len {}", key.len());
                Some(key)
            }
            SecurityMode::NoSec => None,
        };

        let bind_addr = get(keys::COAP_BIND_ADDR, defaults::COAP_BIND_ADDR);
        if bind_addr.trim().is_empty() {
            return Err(ConfigError::MissingBindAddr);
        }

        log::debug!("Init complete");
        Ok(Self {
            security_mode,
            bind_addr,
            psk_key,
            port: None,
        })
    }

    /// Build from the process environment (see `constants::envvars`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for (key, var) in [
            (keys::COAP_BIND_ADDR, envvars::COAP_BIND_ADDR),
            (keys::SECURITY_MODE, envvars::COAP_SECURITY_MODE),
            (keys::PSK_KEY, envvars::COAP_PSK_KEY),
        ] {
            if let Ok(value) = env::var(var) {
                map.insert(key.to_string(), value);
            }
        }
        let mut config = Self::from_map(&map)?;

        if let Ok(port) = env::var(envvars::COAP_PORT) {
            config.port = Some(
                port.parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort(port))?,
            );
        }
        Ok(config)
    }
}

fn find_security_mode(mode_text: &str) -> Result<SecurityMode, ConfigError> {
    match mode_text {
        "PSK" => Ok(SecurityMode::Psk),
        "NoSec" => Ok(SecurityMode::NoSec),
        other => Err(ConfigError::UnknownSecurityMode(other.to_string())),
    }
}

fn decode_psk_key(encoded: &str) -> Result<Vec<u8>, ConfigError> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(ConfigError::MissingPskKey);
    }
    let key = STANDARD.decode(encoded)?;
    if key.is_empty() {
        return Err(ConfigError::MissingPskKey);
    }
    Ok(key)
}

/// Location of the device registry document
pub fn registry_path() -> PathBuf {
    match env::var(envvars::DEVICE_REGISTRY) {
        Ok(path) => PathBuf::from(path),
        Err(_) => base_path::DATA_DIR.join(defaults::REGISTRY_FILE),
    }
}
