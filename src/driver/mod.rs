pub mod config;

pub use config::{registry_path, DriverConfig, SecurityMode};
