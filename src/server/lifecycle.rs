use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::SigId;
use thiserror::Error;

use crate::constants::defaults;
use crate::driver::config::DriverConfig;

use super::address::{resolve_address, ResolveError};
use super::coap::CoapService;
use super::transport::{TransportContext, TransportError, TransportMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    ConfigLoaded,
    TransportBound,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("cannot install signal handler: {0}")]
    Signal(#[source] io::Error),
    #[error("server is {actual}; expected {expected}")]
    InvalidState {
        expected: ServerState,
        actual: ServerState,
    },
}

/// CoAP server driving a single transport context from the calling thread.
///
/// Teardown runs when the loop ends, when binding fails, and on drop.
pub struct Server<S: CoapService> {
    config: DriverConfig,
    service: Option<S>,
    transport: Option<TransportContext<S>>,
    stop: Arc<AtomicBool>,
    signals: Vec<SigId>,
    io_wait: Duration,
    state: ServerState,
}

impl<S: CoapService> Server<S> {
    pub fn new(config: DriverConfig, service: S) -> Self {
        Self {
            config,
            service: Some(service),
            transport: None,
            stop: Arc::new(AtomicBool::new(false)),
            signals: Vec::new(),
            io_wait: defaults::IO_WAIT,
            state: ServerState::ConfigLoaded,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Flag polled between readiness waits; setting it stops the loop.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Upper bound on one readiness wait, i.e. on how long a stop request
    /// can go unnoticed
    pub fn set_io_wait(&mut self, wait: Duration) {
        self.io_wait = wait;
    }

    /// The registered service, before or after binding
    pub fn service(&self) -> Option<&S> {
        match &self.transport {
            Some(transport) => transport.resource(),
            None => self.service.as_ref(),
        }
    }

    /// Raise the stop flag on SIGINT and SIGTERM
    pub fn install_signal_handlers(&mut self) -> Result<(), ServerError> {
        for signal in [SIGINT, SIGTERM] {
            let id = signal_hook::flag::register(signal, Arc::clone(&self.stop))
                .map_err(ServerError::Signal)?;
            self.signals.push(id);
        }
        Ok(())
    }

    /// Create the transport context and bind it. Returns the bound address.
    pub fn bind(&mut self) -> Result<SocketAddr, ServerError> {
        self.expect_state(ServerState::ConfigLoaded)?;
        match self.try_bind() {
            Ok(addr) => {
                self.state = ServerState::TransportBound;
                log::info!(
                    "CoAP {} server started on {addr}",
                    self.config.security_mode
                );
                Ok(addr)
            }
            Err(e) => {
                log::error!("{e}");
                self.teardown();
                Err(e)
            }
        }
    }

    fn try_bind(&mut self) -> Result<SocketAddr, ServerError> {
        let mode = TransportMode::for_security(self.config.security_mode);
        let port = self.config.port.unwrap_or(mode.default_port());
        let addr = resolve_address(&self.config.bind_addr, &port.to_string())?;

        let mut transport = TransportContext::new(mode)?;
        if let Some(key) = &self.config.psk_key {
            transport.set_psk(key)?;
        }
        let bound = transport.bind(addr)?;
        if let Some(service) = self.service.take() {
            transport.register(service);
        }
        self.transport = Some(transport);
        Ok(bound)
    }

    /// Pump I/O until the stop flag is raised, then tear down.
    pub fn run(&mut self) -> Result<(), ServerError> {
        self.expect_state(ServerState::TransportBound)?;
        self.state = ServerState::Running;

        let result = self.pump();

        self.state = ServerState::Stopping;
        log::info!("Stopping CoAP server");
        self.teardown();
        result
    }

    fn pump(&mut self) -> Result<(), ServerError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(TransportError::NotBound.into());
        };
        while !self.stop.load(Ordering::SeqCst) {
            match transport.process_io(self.io_wait) {
                Ok(_) => {}
                // ICMP errors from earlier sends surface on the next receive
                Err(TransportError::Io(e)) => log::warn!("CoAP I/O error: {e}"),
                Err(e) => {
                    log::error!("{e}");
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    fn expect_state(&self, expected: ServerState) -> Result<(), ServerError> {
        if self.state != expected {
            return Err(ServerError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn teardown(&mut self) {
        if self.state == ServerState::Stopped {
            return;
        }
        self.transport = None;
        for id in self.signals.drain(..) {
            signal_hook::low_level::unregister(id);
        }
        self.state = ServerState::Stopped;
        log::debug!("CoAP server stopped");
    }
}

impl<S: CoapService> Drop for Server<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
