pub mod constants;
pub mod data_mgmt;
pub mod driver;
pub mod helpers;
pub mod interfaces;
pub mod server;
