//! Byte transport and indicator collaborators.
//!
//! The device engine never touches hardware directly. It talks to a
//! [`Transport`] for bytes and an [`Indicator`] for status notifications.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};
use tracing::{info, trace};

use crate::error::TransportError;

// ============================================================================
// Transport
// ============================================================================

/// Blocking point-to-point byte link.
pub trait Transport {
    /// Open or configure the link before the Setup handshake.
    fn open(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Send all of `bytes`.
    fn send_exactly(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Fill all of `buf`, blocking until the bytes arrive.
    fn receive_exactly(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Discard input that has already arrived but was not read.
    fn flush_pending_input(&mut self);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self) -> Result<(), TransportError> {
        (**self).open()
    }

    fn send_exactly(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send_exactly(bytes)
    }

    fn receive_exactly(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        (**self).receive_exactly(buf)
    }

    fn flush_pending_input(&mut self) {
        (**self).flush_pending_input()
    }
}

/// In-memory transport.
///
/// Input is queued as bursts, each standing for bytes that arrive together.
/// [`Transport::flush_pending_input`] drops the rest of the burst being read,
/// leaving later bursts queued.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    current: Bytes,
    pending: VecDeque<Bytes>,
    output: Vec<u8>,
    opened: usize,
    flushes: usize,
}

impl MemoryTransport {
    /// Create a transport with no input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one burst of input.
    pub fn push_input(&mut self, data: impl Into<Bytes>) {
        self.pending.push_back(data.into());
    }

    /// Everything the device sent.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Take the output collected so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Input bytes not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.current.len() + self.pending.iter().map(Bytes::len).sum::<usize>()
    }

    /// Number of times the link was opened.
    pub fn open_count(&self) -> usize {
        self.opened
    }

    /// Number of input flushes.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.opened += 1;
        Ok(())
    }

    fn send_exactly(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn receive_exactly(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let mut filled = 0;
        while filled < buf.len() {
            if !self.current.has_remaining() {
                self.current = self.pending.pop_front().ok_or(TransportError::Closed)?;
                continue;
            }
            let take = self.current.remaining().min(buf.len() - filled);
            self.current.copy_to_slice(&mut buf[filled..filled + take]);
            filled += take;
        }
        Ok(())
    }

    fn flush_pending_input(&mut self) {
        trace!(dropped = self.current.len(), "flushing pending input");
        self.current.clear();
        self.flushes += 1;
    }
}

// ============================================================================
// Indicator
// ============================================================================

/// Status notifications with no protocol effect.
pub trait Indicator {
    /// The device powered up.
    fn boot(&mut self) {}

    /// A session is about to start.
    fn ready(&mut self) {}

    /// One message was processed.
    fn tick(&mut self) {}

    /// The session ended with `code` (0 on success).
    fn shutdown(&mut self, _code: u8) {}
}

/// Indicator that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIndicator;

impl Indicator for NullIndicator {}

/// Indicator that reports notifications as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator {
    ticks: u64,
}

impl LogIndicator {
    /// Messages processed in the current session.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Indicator for LogIndicator {
    fn boot(&mut self) {
        info!("device booted");
    }

    fn ready(&mut self) {
        self.ticks = 0;
        info!("device ready");
    }

    fn tick(&mut self) {
        self.ticks += 1;
        trace!(ticks = self.ticks, "tick");
    }

    fn shutdown(&mut self, code: u8) {
        info!(code, messages = self.ticks, "session shut down");
    }
}
