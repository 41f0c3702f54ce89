//! Session state machine and top-level driver.
//!
//! ```text
//! Boot ──> Setup ──> Looping ──> Hangup
//!                      │  ^
//!                      └──┘ one message per tick
//! ```
//!
//! Every path out of Setup or Looping, graceful or fatal, ends in exactly one
//! Hangup frame. Fatal errors are plain `Result` values; [`Device::run_session`]
//! is the only place that catches them.

use ez_protocol::{OpCode, SetupInfo};
use ez_symbols::{BuiltinTables, LinkedTable, SymbolResolver};
use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::codec::{
    await_handshake, receive_message, send_hangup_message, send_message, send_report_string,
    send_report_value, send_setup_message, Inbound,
};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, FatalError, Recoverable};
use crate::handler::{Env, HandlerHandle, HandlerRegistry, Report};
use crate::memory::CodeBuffer;
use crate::rpc;
use crate::transport::{Indicator, NullIndicator, Transport};

/// Where the device is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Powered up, no protocol traffic yet.
    Boot,
    /// Sending the handshake.
    Setup,
    /// Serving messages.
    Looping,
    /// Session over; Hangup sent.
    Hangup,
}

/// The device-side RPC engine.
pub struct Device<'a, I: Indicator = NullIndicator> {
    config: DeviceConfig,
    arena: Arena,
    builtins: BuiltinTables,
    linked: LinkedTable<'a>,
    code: CodeBuffer,
    registry: HandlerRegistry,
    reports: Vec<Report>,
    indicator: I,
    state: SessionState,
}

impl<'a> Device<'a, NullIndicator> {
    /// Create a device without status notifications.
    pub fn new(config: DeviceConfig, linked: LinkedTable<'a>) -> Result<Self, DeviceError> {
        Self::with_indicator(config, linked, NullIndicator)
    }
}

impl<'a, I: Indicator> Device<'a, I> {
    /// Create a device that reports status through `indicator`.
    pub fn with_indicator(
        config: DeviceConfig,
        linked: LinkedTable<'a>,
        indicator: I,
    ) -> Result<Self, DeviceError> {
        config.validate()?;

        let mut registry = HandlerRegistry::new();
        rpc::install(&mut registry, &config.builtins)?;

        Ok(Device {
            arena: Arena::new(config.arena_capacity),
            builtins: BuiltinTables::new(&config.builtins),
            code: CodeBuffer::new(config.code_buffer.base, config.code_buffer.size),
            linked,
            registry,
            reports: Vec::new(),
            indicator,
            state: SessionState::Boot,
            config,
        })
    }

    /// The configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handlers, for registering device-specific endpoints.
    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// The simulated code buffer.
    pub fn code_buffer(&self) -> &CodeBuffer {
        &self.code
    }

    /// The status indicator.
    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Name → address resolution over this device's tables.
    pub fn resolver(&self) -> SymbolResolver<'_> {
        SymbolResolver::new(&self.builtins, self.linked)
    }

    /// Power-up notification. No protocol traffic.
    pub fn boot(&mut self) {
        self.state = SessionState::Boot;
        self.indicator.boot();
    }

    /// Serve sessions back to back, one per link, until `links` runs out.
    ///
    /// Returns the status code of every session in order.
    pub fn run<T, L>(&mut self, links: L) -> Vec<u8>
    where
        T: Transport,
        L: IntoIterator<Item = T>,
    {
        links
            .into_iter()
            .map(|mut transport| self.run_session(&mut transport))
            .collect()
    }

    /// Run one session to completion and return its status code.
    ///
    /// 0 means the host hung up; anything else is a fatal error code in
    /// `1..=127`. The Hangup frame is sent exactly once either way.
    pub fn run_session<T: Transport + ?Sized>(&mut self, transport: &mut T) -> u8 {
        let outcome = self.serve(transport);
        let code = match &outcome {
            Ok(()) => 0,
            Err(err) => {
                warn!(code = err.code(), kind = ?err.kind, "fatal: {}", err);
                err.code()
            }
        };

        self.state = SessionState::Hangup;
        self.reports.clear();
        if let Err(err) = send_hangup_message(transport, &mut self.arena, outcome.as_ref().err()) {
            debug!(%err, "hangup not delivered");
        }
        self.indicator.shutdown(code);
        info!(code, "session ended");
        code
    }

    fn serve<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<(), FatalError> {
        self.state = SessionState::Setup;
        self.indicator.ready();
        transport.open()?;
        if self.config.await_handshake {
            await_handshake(transport)?;
        }

        let info = SetupInfo {
            version: &self.config.version,
            code_buffer_base: self.config.code_buffer.base,
            code_buffer_size: self.config.code_buffer.size,
            symbols: self.builtins.bootstrap(),
        };
        send_setup_message(transport, &mut self.arena, &info)?;
        info!(
            version = %self.config.version,
            arena = self.arena.capacity(),
            "session started"
        );

        self.state = SessionState::Looping;
        while self.tick(transport)? {
            self.indicator.tick();
        }
        Ok(())
    }

    /// Process one inbound message.
    ///
    /// Returns `Ok(false)` once the host hangs up.
    pub fn tick<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<bool, FatalError> {
        match receive_message(transport, &mut self.arena)? {
            Inbound::Hangup { seq_id } => {
                debug!(seq_id, "hangup requested");
                Ok(false)
            }
            Inbound::Rejected { seq_id, reason } => {
                self.reply_error(transport, seq_id, &reason)?;
                Ok(true)
            }
            Inbound::Call { seq_id, handle } => {
                self.dispatch(transport, seq_id, handle)?;
                Ok(true)
            }
        }
    }

    fn reply_error<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        seq_id: u32,
        reason: &Recoverable,
    ) -> Result<(), FatalError> {
        let text = self.arena.format_error(format_args!("{}", reason));
        send_message(transport, OpCode::Result, seq_id, text)?;
        Ok(())
    }

    fn dispatch<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        seq_id: u32,
        handle: HandlerHandle,
    ) -> Result<(), FatalError> {
        if !self.registry.contains(handle) {
            let reason = Recoverable::UnknownHandler {
                address: handle.address(),
            };
            warn!(seq_id, %handle, "call to unregistered handler");
            return self.reply_error(transport, seq_id, &reason);
        }

        let Device {
            arena,
            builtins,
            linked,
            code,
            registry,
            reports,
            ..
        } = self;

        let (input, mut response) = arena.split();
        debug!(seq_id, %handle, input = input.len(), "dispatching call");
        if let Some(handler) = registry.get_mut(handle) {
            let mut env = Env {
                resolver: SymbolResolver::new(builtins, *linked),
                code: &mut *code,
                reports: &mut *reports,
                seq_id,
            };
            handler.call(&mut env, input, &mut response)?;
        }

        for report in reports.drain(..) {
            match report {
                Report::Value(value) => send_report_value(transport, seq_id, value)?,
                Report::String(text) => send_report_string(transport, seq_id, &text)?,
            }
        }
        send_message(transport, OpCode::Result, seq_id, response.written())?;
        Ok(())
    }
}
