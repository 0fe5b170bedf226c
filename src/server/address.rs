use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid service '{0}'; expected a port number")]
    InvalidService(String),
    #[error("could not resolve {host}: {source}")]
    Lookup { host: String, source: io::Error },
    #[error("no usable IPv4 or IPv6 address for {0}")]
    NoUsableAddress(String),
}

/// Resolve a bind host and service (port) to a socket address.
///
/// Takes the first address in resolution order, whichever family it is.
/// `0.0.0.0` and `::` bind to every interface of their family.
pub fn resolve_address(host: &str, service: &str) -> Result<SocketAddr, ResolveError> {
    let port = service
        .parse::<u16>()
        .map_err(|_| ResolveError::InvalidService(service.to_string()))?;

    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ResolveError::Lookup {
            host: host.to_string(),
            source,
        })?;

    let addr = addrs
        .find(|a| a.is_ipv4() || a.is_ipv6())
        .ok_or_else(|| ResolveError::NoUsableAddress(host.to_string()))?;
    log::debug!("Resolved {host}:{service} to {addr}");
    Ok(addr)
}
