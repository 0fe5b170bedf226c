pub mod mqtt;
pub mod registry;

pub use registry::{DeviceLease, DeviceRegistry, FileRegistry};
