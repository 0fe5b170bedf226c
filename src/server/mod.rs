pub mod address;
pub mod coap;
#[cfg(feature = "dtls")]
mod dtls;
pub mod handler;
pub mod lifecycle;
pub mod router;
pub mod transport;

pub use handler::RequestHandler;
pub use lifecycle::{Server, ServerError, ServerState};
