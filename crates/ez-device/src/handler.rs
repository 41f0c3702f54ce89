//! Call handlers.
//!
//! A Call names its handler by device address in the header tag. The address
//! is treated as an opaque [`HandlerHandle`] and must match a handler
//! registered in the [`HandlerRegistry`] before anything is invoked.

use std::collections::BTreeMap;
use std::fmt;

use ez_symbols::SymbolResolver;

use crate::error::{FatalError, RegistryError};
use crate::memory::CodeBuffer;
use crate::response::ResponseWriter;

/// Handler reference carried in a Call's tag slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerHandle(pub u32);

impl HandlerHandle {
    /// Device address of the handler.
    pub fn address(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for HandlerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Unsolicited output produced while a Call runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Sent as ReportValue.
    Value(u64),
    /// Sent as ReportString.
    String(Vec<u8>),
}

/// Device state a handler may use.
pub struct Env<'e> {
    pub(crate) resolver: SymbolResolver<'e>,
    pub(crate) code: &'e mut CodeBuffer,
    pub(crate) reports: &'e mut Vec<Report>,
    pub(crate) seq_id: u32,
}

impl<'e> Env<'e> {
    /// Symbol resolution over the builtin and linked tables.
    pub fn resolver(&self) -> &SymbolResolver<'e> {
        &self.resolver
    }

    /// The code buffer.
    pub fn code(&self) -> &CodeBuffer {
        self.code
    }

    /// The code buffer, writable.
    pub fn code_mut(&mut self) -> &mut CodeBuffer {
        self.code
    }

    /// SeqID of the Call being handled.
    pub fn seq_id(&self) -> u32 {
        self.seq_id
    }

    /// Queue a ReportValue, sent before the Call's Result.
    pub fn report_value(&mut self, value: u64) {
        self.reports.push(Report::Value(value));
    }

    /// Queue a ReportString, sent before the Call's Result.
    pub fn report_string(&mut self, text: impl Into<Vec<u8>>) {
        self.reports.push(Report::String(text.into()));
    }
}

/// A device-side endpoint.
///
/// Handlers read their arguments from `input` and write their result to
/// `response`. Recoverable failures are reported by writing error text with
/// [`ResponseWriter::error`]; returning an error ends the session.
pub trait Handler {
    /// Handle one Call.
    fn call(
        &mut self,
        env: &mut Env<'_>,
        input: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), FatalError>;
}

impl<F> Handler for F
where
    F: FnMut(&mut Env<'_>, &[u8], &mut ResponseWriter<'_>) -> Result<(), FatalError>,
{
    fn call(
        &mut self,
        env: &mut Env<'_>,
        input: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), FatalError> {
        self(env, input, response)
    }
}

/// Handlers by device address.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<u32, Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` at `address`.
    pub fn register<H: Handler + 'static>(
        &mut self,
        address: u32,
        handler: H,
    ) -> Result<(), RegistryError> {
        if address == 0 {
            return Err(RegistryError::NullAddress);
        }
        if self.handlers.contains_key(&address) {
            return Err(RegistryError::Duplicate { address });
        }
        self.handlers.insert(address, Box::new(handler));
        Ok(())
    }

    /// Register a closure or function at `address`.
    pub fn register_fn<F>(&mut self, address: u32, f: F) -> Result<(), RegistryError>
    where
        F: FnMut(&mut Env<'_>, &[u8], &mut ResponseWriter<'_>) -> Result<(), FatalError> + 'static,
    {
        self.register(address, f)
    }

    /// Whether a handler owns `handle`.
    pub fn contains(&self, handle: HandlerHandle) -> bool {
        self.handlers.contains_key(&handle.0)
    }

    /// The handler for `handle`.
    pub fn get_mut(&mut self, handle: HandlerHandle) -> Option<&mut (dyn Handler + 'static)> {
        self.handlers.get_mut(&handle.0).map(|h| h.as_mut())
    }

    /// Registered addresses in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.handlers.keys().copied()
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.keys().map(|a| HandlerHandle(*a)))
            .finish()
    }
}
