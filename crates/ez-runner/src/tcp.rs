//! TCP link for the device simulator.
//!
//! One accepted connection stands in for the serial line of one session.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ez_device::{Transport, TransportError};
use tracing::{debug, trace, warn};

/// How often the accept loop checks for shutdown.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A device transport over a blocking TCP stream.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Wrap an accepted stream.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(TcpTransport { stream, peer })
    }

    /// Address of the host.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send_exactly(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    fn receive_exactly(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.stream.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(e),
        })
    }

    /// Drain whatever the host has already sent.
    fn flush_pending_input(&mut self) {
        if let Err(e) = self.stream.set_nonblocking(true) {
            warn!("cannot flush input: {}", e);
            return;
        }

        let mut dropped = 0usize;
        let mut chunk = [0u8; 256];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    trace!(bytes = %hex::encode(&chunk[..n.min(16)]), "dropping input");
                    dropped += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }

        if let Err(e) = self.stream.set_nonblocking(false) {
            warn!("cannot restore blocking mode: {}", e);
        }
        debug!(dropped, peer = %self.peer, "flushed pending input");
    }
}

/// Wait for the next host connection.
///
/// Returns `None` once `shutdown` is set or the listener fails.
pub fn accept_next(listener: &TcpListener, shutdown: &AtomicBool) -> Option<TcpTransport> {
    if let Err(e) = listener.set_nonblocking(true) {
        warn!("listener unusable: {}", e);
        return None;
    }

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => match TcpTransport::new(stream) {
                Ok(transport) => {
                    debug!(peer = %transport.peer(), "host connected");
                    return Some(transport);
                }
                Err(e) => warn!("dropping connection: {}", e),
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                warn!("accept failed: {}", e);
                return None;
            }
        }
    }
    None
}
