//! DTLS 1.2 endpoint with pre-shared key authentication.
//!
//! One OpenSSL session is kept per peer address. Datagrams are fed to the
//! session through an in-memory adapter so a single socket serves every peer.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use openssl::error::ErrorStack;
use openssl::ssl::{ErrorCode, Ssl, SslContext, SslMethod, SslRef, SslStream};

use super::coap::CoapService;
use super::transport::{
    dispatch_datagram, is_oversized, is_wait_over, TransportError, MAX_DATAGRAM, RECV_BUFFER,
};

pub const PSK_CIPHERS: &str = "PSK-AES128-CCM8:PSK-AES128-CBC-SHA256";

const MAX_SESSIONS: usize = 256;
const SESSION_IDLE: Duration = Duration::from_secs(300);

/// Datagrams queued between the socket and one OpenSSL session. Each write
/// from OpenSSL is one outbound datagram.
#[derive(Default)]
struct Datagrams {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
}

impl Read for Datagrams {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(datagram) = self.inbound.pop_front() else {
            return Err(io::ErrorKind::WouldBlock.into());
        };
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(len)
    }
}

impl Write for Datagrams {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Session {
    stream: SslStream<Datagrams>,
    established: bool,
    last_seen: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum SessionStatus {
    Open,
    Closed,
}

pub struct DtlsEndpoint {
    socket: UdpSocket,
    context: SslContext,
    sessions: HashMap<SocketAddr, Session>,
}

impl DtlsEndpoint {
    pub fn new(socket: UdpSocket, psk: Vec<u8>) -> Result<Self, TransportError> {
        let context = psk_context(psk).map_err(|e| TransportError::Psk(e.to_string()))?;
        Ok(Self {
            socket,
            context,
            sessions: HashMap::new(),
        })
    }

    pub fn process_io<S: CoapService>(
        &mut self,
        wait: Duration,
        resource: &S,
    ) -> Result<usize, TransportError> {
        self.socket.set_read_timeout(Some(wait))?;

        let mut buf = [0u8; RECV_BUFFER];
        let (len, peer) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if is_wait_over(&e) => {
                self.expire_idle();
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };
        // Never reaches the session, which stays usable
        if is_oversized(len, peer) {
            return Ok(1);
        }

        if !self.sessions.contains_key(&peer) {
            self.expire_idle();
            if self.sessions.len() >= MAX_SESSIONS {
                log::warn!("DTLS session limit reached; dropping datagram from {peer}");
                return Ok(1);
            }
            let session = match self.open_session() {
                Ok(session) => session,
                Err(e) => {
                    log::error!("cannot create DTLS session for {peer}: {e}");
                    return Ok(1);
                }
            };
            self.sessions.insert(peer, session);
        }

        let Some(session) = self.sessions.get_mut(&peer) else {
            return Ok(1);
        };
        session.last_seen = Instant::now();
        session.stream.get_mut().inbound.push_back(buf[..len].to_vec());

        let status = drive(session, peer, resource);
        for datagram in session.stream.get_mut().outbound.drain(..) {
            self.socket.send_to(&datagram, peer)?;
        }
        if status == SessionStatus::Closed {
            self.sessions.remove(&peer);
            log::debug!("DTLS session with {peer} closed");
        }
        Ok(1)
    }

    fn open_session(&self) -> Result<Session, ErrorStack> {
        let ssl = Ssl::new(&self.context)?;
        Ok(Session {
            stream: SslStream::new(ssl, Datagrams::default())?,
            established: false,
            last_seen: Instant::now(),
        })
    }

    fn expire_idle(&mut self) {
        let now = Instant::now();
        self.sessions.retain(|peer, session| {
            let keep = now.duration_since(session.last_seen) < SESSION_IDLE;
            if !keep {
                log::debug!("expiring idle DTLS session with {peer}");
            }
            keep
        });
    }
}

fn psk_context(psk: Vec<u8>) -> Result<SslContext, ErrorStack> {
    let mut builder = SslContext::builder(SslMethod::dtls())?;
    builder.set_cipher_list(PSK_CIPHERS)?;
    builder.set_psk_server_callback(
        move |_ssl: &mut SslRef, identity: Option<&[u8]>, out: &mut [u8]| {
            if let Some(identity) = identity {
                log::debug!("PSK identity {}", String::from_utf8_lossy(identity));
            }
            if out.len() < psk.len() {
                return Err(ErrorStack::get());
            }
            out[..psk.len()].copy_from_slice(&psk);
            Ok(psk.len())
        },
    );
    Ok(builder.build())
}

/// Advance the handshake, then serve every application record available
fn drive<S: CoapService>(session: &mut Session, peer: SocketAddr, resource: &S) -> SessionStatus {
    if !session.established {
        match session.stream.accept() {
            Ok(()) => {
                session.established = true;
                log::info!("DTLS session established with {peer}");
            }
            Err(e) if e.code() == ErrorCode::WANT_READ => return SessionStatus::Open,
            Err(e) => {
                log::warn!("DTLS handshake with {peer} failed: {e}");
                return SessionStatus::Closed;
            }
        }
    }

    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        match session.stream.ssl_read(&mut buf) {
            Ok(len) => {
                let Some(reply) = dispatch_datagram(&buf[..len], peer, resource) else {
                    continue;
                };
                if let Err(e) = session.stream.ssl_write(&reply) {
                    log::warn!("DTLS write to {peer} failed: {e}");
                    return SessionStatus::Closed;
                }
            }
            Err(e) if e.code() == ErrorCode::WANT_READ => return SessionStatus::Open,
            Err(e) if e.code() == ErrorCode::ZERO_RETURN => {
                let _ = session.stream.shutdown();
                return SessionStatus::Closed;
            }
            Err(e) => {
                log::warn!("DTLS read from {peer} failed: {e}");
                return SessionStatus::Closed;
            }
        }
    }
}
