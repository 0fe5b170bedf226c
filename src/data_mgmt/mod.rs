pub mod decode;
pub mod models;
pub mod payload;
pub mod publish;
