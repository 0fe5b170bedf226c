//! CoAP transport context: owns the bound endpoint and the registered
//! resource, and drives one readiness wait at a time.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use coap_lite::Packet;
use thiserror::Error;

use crate::constants::defaults;
use crate::driver::config::SecurityMode;

use super::coap::{self, CoapService};
#[cfg(feature = "dtls")]
use super::dtls::DtlsEndpoint;

/// Largest datagram accepted; longer ones are dropped undispatched
pub const MAX_DATAGRAM: usize = 1500;

/// One byte over the limit, so an oversized datagram is seen as such
/// instead of being cut to fit
pub(crate) const RECV_BUFFER: usize = MAX_DATAGRAM + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    Udp,
    Dtls,
}

impl TransportMode {
    pub fn for_security(mode: SecurityMode) -> Self {
        match mode {
            SecurityMode::NoSec => TransportMode::Udp,
            SecurityMode::Psk => TransportMode::Dtls,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            TransportMode::Udp => defaults::COAP_PORT,
            TransportMode::Dtls => defaults::COAPS_PORT,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("DTLS support not compiled in; rebuild with the 'dtls' feature")]
    DtlsUnavailable,
    #[error("cannot initialize PSK: {0}")]
    Psk(String),
    #[error("cannot initialize listen endpoint on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
    #[error("no endpoint bound")]
    NotBound,
    #[error("no resource registered")]
    NoResource,
    #[error(transparent)]
    Io(#[from] io::Error),
}

enum Endpoint {
    Udp(UdpSocket),
    #[cfg(feature = "dtls")]
    Dtls(DtlsEndpoint),
}

pub struct TransportContext<S> {
    mode: TransportMode,
    psk: Option<Vec<u8>>,
    endpoint: Option<Endpoint>,
    resource: Option<S>,
}

impl<S: CoapService> TransportContext<S> {
    pub fn new(mode: TransportMode) -> Result<Self, TransportError> {
        if mode == TransportMode::Dtls && !cfg!(feature = "dtls") {
            return Err(TransportError::DtlsUnavailable);
        }
        Ok(Self {
            mode,
            psk: None,
            endpoint: None,
            resource: None,
        })
    }

    /// Install the pre-shared key used for every DTLS session. Must be
    /// called before [`bind`](Self::bind).
    pub fn set_psk(&mut self, key: &[u8]) -> Result<(), TransportError> {
        if self.mode != TransportMode::Dtls {
            return Err(TransportError::Psk("PSK requires the DTLS transport".into()));
        }
        if key.is_empty() {
            return Err(TransportError::Psk("empty key".into()));
        }
        self.psk = Some(key.to_vec());
        Ok(())
    }

    /// Bind the listen endpoint; returns the bound address.
    pub fn bind(&mut self, addr: SocketAddr) -> Result<SocketAddr, TransportError> {
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local = socket.local_addr()?;

        let endpoint = match self.mode {
            TransportMode::Udp => Endpoint::Udp(socket),
            #[cfg(feature = "dtls")]
            TransportMode::Dtls => {
                let psk = self
                    .psk
                    .clone()
                    .ok_or_else(|| TransportError::Psk("no key installed".into()))?;
                Endpoint::Dtls(DtlsEndpoint::new(socket, psk)?)
            }
            #[cfg(not(feature = "dtls"))]
            TransportMode::Dtls => return Err(TransportError::DtlsUnavailable),
        };
        self.endpoint = Some(endpoint);
        Ok(local)
    }

    /// Register the resource that receives every request, whatever its path
    pub fn register(&mut self, resource: S) {
        self.resource = Some(resource);
    }

    pub fn resource(&self) -> Option<&S> {
        self.resource.as_ref()
    }

    /// Wait up to `wait` for a datagram and dispatch it. Returns the number
    /// of datagrams processed (0 when the wait timed out).
    pub fn process_io(&mut self, wait: Duration) -> Result<usize, TransportError> {
        let resource = self.resource.as_ref().ok_or(TransportError::NoResource)?;
        match self.endpoint.as_mut() {
            Some(Endpoint::Udp(socket)) => process_udp(socket, wait, resource),
            #[cfg(feature = "dtls")]
            Some(Endpoint::Dtls(dtls)) => dtls.process_io(wait, resource),
            None => Err(TransportError::NotBound),
        }
    }
}

fn process_udp<S: CoapService>(
    socket: &UdpSocket,
    wait: Duration,
    resource: &S,
) -> Result<usize, TransportError> {
    socket.set_read_timeout(Some(wait))?;

    let mut buf = [0u8; RECV_BUFFER];
    let (len, peer) = match socket.recv_from(&mut buf) {
        Ok(received) => received,
        Err(e) if is_wait_over(&e) => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    if is_oversized(len, peer) {
        return Ok(1);
    }

    if let Some(reply) = dispatch_datagram(&buf[..len], peer, resource) {
        socket.send_to(&reply, peer)?;
    }
    Ok(1)
}

/// Decode one datagram, hand requests to the resource, and encode the reply.
pub(crate) fn dispatch_datagram<S: CoapService>(
    datagram: &[u8],
    peer: SocketAddr,
    resource: &S,
) -> Option<Vec<u8>> {
    let packet = match Packet::from_bytes(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            log::debug!("dropping undecodable datagram from {peer}: {e:?}");
            return None;
        }
    };

    let reply = coap::ping_reset(&packet).or_else(|| resource.handle_packet(&packet, peer))?;
    match reply.to_bytes() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::error!("cannot encode response to {peer}: {e:?}");
            None
        }
    }
}

pub(crate) fn is_oversized(len: usize, peer: SocketAddr) -> bool {
    if len > MAX_DATAGRAM {
        log::info!("dropping datagram from {peer} longer than {MAX_DATAGRAM} bytes");
        return true;
    }
    false
}

pub(crate) fn is_wait_over(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
