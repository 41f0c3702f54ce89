//! Device-side message codec.
//!
//! Reads inbound messages into the [`Arena`] and writes outbound frames to
//! the [`Transport`]. Header and payload are always written back to back, so
//! the host never sees a partial frame.

use ez_protocol::{
    MessageHeader, OpCode, SetupInfo, HANGUP_SUCCESS, HEADER_SIZE, SETUP_MAGIC,
};
use tracing::{debug, trace, warn};

use crate::arena::Arena;
use crate::error::{FatalError, FatalKind, Fault, Recoverable, TransportError};
use crate::handler::HandlerHandle;
use crate::transport::Transport;

/// A message accepted from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Invoke a handler; the payload is the arena's input view.
    Call {
        /// Request id to echo in the Result.
        seq_id: u32,
        /// Handler named by the header tag.
        handle: HandlerHandle,
    },
    /// End the session.
    Hangup {
        /// Request id.
        seq_id: u32,
    },
    /// The message was refused; reply with `reason` and continue.
    Rejected {
        /// Best-known request id.
        seq_id: u32,
        /// What went wrong.
        reason: Recoverable,
    },
}

// ============================================================================
// Receive
// ============================================================================

/// Read the next header. A link that cannot deliver a header is dead.
pub fn receive_header<T: Transport + ?Sized>(
    transport: &mut T,
) -> Result<[u8; HEADER_SIZE], FatalError> {
    let mut raw = [0u8; HEADER_SIZE];
    transport.receive_exactly(&mut raw).map_err(|err| {
        debug!(%err, "header receive failed");
        FatalError::new(
            FatalKind::LinkDown,
            "Error receiving message header. Shutting down.",
        )
    })?;
    Ok(raw)
}

/// Decode a raw header, resynchronizing the link when it is malformed.
pub fn decode_header<T: Transport + ?Sized>(
    transport: &mut T,
    raw: &[u8],
) -> Result<MessageHeader, Fault> {
    MessageHeader::decode(raw).map_err(|err| {
        transport.flush_pending_input();
        Fault::Recoverable(Recoverable::MalformedHeader(err))
    })
}

/// Refuse payloads the arena cannot hold.
///
/// The payload is never read; pending input is flushed instead.
pub fn validate_payload<T: Transport + ?Sized>(
    transport: &mut T,
    header: &MessageHeader,
    capacity: usize,
) -> Result<(), Fault> {
    if header.payload_bytes as usize > capacity {
        transport.flush_pending_input();
        return Err(Recoverable::PayloadTooLarge {
            payload_bytes: header.payload_bytes,
            capacity,
        }
        .into());
    }
    Ok(())
}

/// Accept only Call and Hangup, draining the payload of anything else.
pub fn accept_opcode<T: Transport + ?Sized>(
    transport: &mut T,
    arena: &mut Arena,
    header: &MessageHeader,
) -> Result<(), Fault> {
    if header.op_code.is_inbound() {
        return Ok(());
    }
    receive_payload(transport, arena, header.payload_bytes)?;
    arena.reset();
    Err(Recoverable::UnexpectedOpCode(u32::from(header.op_code)).into())
}

fn receive_payload<T: Transport + ?Sized>(
    transport: &mut T,
    arena: &mut Arena,
    payload_bytes: u32,
) -> Result<(), Fault> {
    let slot = arena.input_slot(payload_bytes as usize)?;
    transport.receive_exactly(slot)?;
    Ok(())
}

/// Receive one message into `arena`.
///
/// Recoverable problems come back as [`Inbound::Rejected`]; only fatal ones
/// are returned as errors.
pub fn receive_message<T: Transport + ?Sized>(
    transport: &mut T,
    arena: &mut Arena,
) -> Result<Inbound, FatalError> {
    arena.reset();
    let raw = receive_header(transport)?;
    let seq_id = MessageHeader::seq_id_of(&raw);

    match accept_message(transport, arena, &raw) {
        Ok(inbound) => Ok(inbound),
        Err(Fault::Recoverable(reason)) => {
            warn!(seq_id, %reason, "rejected message");
            Ok(Inbound::Rejected { seq_id, reason })
        }
        Err(Fault::Fatal(err)) => Err(err),
    }
}

fn accept_message<T: Transport + ?Sized>(
    transport: &mut T,
    arena: &mut Arena,
    raw: &[u8],
) -> Result<Inbound, Fault> {
    let header = decode_header(transport, raw)?;
    validate_payload(transport, &header, arena.capacity())?;
    accept_opcode(transport, arena, &header)?;
    receive_payload(transport, arena, header.payload_bytes)?;

    trace!(
        op = %header.op_code,
        seq_id = header.seq_id,
        payload = header.payload_bytes,
        "received message"
    );

    Ok(match header.op_code {
        OpCode::Call => Inbound::Call {
            seq_id: header.seq_id,
            handle: HandlerHandle(header.tag),
        },
        _ => Inbound::Hangup {
            seq_id: header.seq_id,
        },
    })
}

/// Consume input until the handshake magic has been seen.
///
/// Leading bytes that do not complete the magic are discarded.
pub fn await_handshake<T: Transport + ?Sized>(transport: &mut T) -> Result<(), FatalError> {
    let mut window = [0u8; SETUP_MAGIC.len()];
    let mut seen = 0usize;
    let mut skipped = 0usize;
    loop {
        let mut byte = [0u8; 1];
        transport.receive_exactly(&mut byte)?;
        window.copy_within(1.., 0);
        window[SETUP_MAGIC.len() - 1] = byte[0];
        seen += 1;
        if seen >= SETUP_MAGIC.len() && window == SETUP_MAGIC {
            debug!(skipped, "handshake received");
            return Ok(());
        }
        if seen >= SETUP_MAGIC.len() {
            skipped += 1;
        }
    }
}

// ============================================================================
// Send
// ============================================================================

/// Send a header and its payload as two ordered writes.
pub fn send_message<T: Transport + ?Sized>(
    transport: &mut T,
    op_code: OpCode,
    seq_id: u32,
    payload: &[u8],
) -> Result<(), TransportError> {
    let header = MessageHeader::new(op_code, seq_id, payload.len() as u32);
    trace!(op = %op_code, seq_id, payload = payload.len(), "sending message");
    transport.send_exactly(&header.encode())?;
    transport.send_exactly(payload)
}

/// Send the handshake magic followed by the Setup message.
///
/// The payload is built in the arena; one that does not fit is fatal.
pub fn send_setup_message<T: Transport + ?Sized>(
    transport: &mut T,
    arena: &mut Arena,
    info: &SetupInfo<'_>,
) -> Result<(), FatalError> {
    let buf = arena.scratch();
    let len = info
        .encode_into(buf)
        .map_err(|err| FatalError::new(FatalKind::SetupOverflow, err.to_string()))?;

    transport.send_exactly(&SETUP_MAGIC)?;
    send_message(transport, OpCode::Setup, 0, &buf[..len])?;
    Ok(())
}

/// Send the terminal Hangup: a single zero byte on success, else the error text.
pub fn send_hangup_message<T: Transport + ?Sized>(
    transport: &mut T,
    arena: &mut Arena,
    failure: Option<&FatalError>,
) -> Result<(), TransportError> {
    match failure {
        None => send_message(transport, OpCode::Hangup, 0, &HANGUP_SUCCESS),
        Some(err) => {
            let text = arena.format_error(format_args!("{}", err));
            send_message(transport, OpCode::Hangup, 0, text)
        }
    }
}

/// Send a string reported by injected code.
pub fn send_report_string<T: Transport + ?Sized>(
    transport: &mut T,
    seq_id: u32,
    text: &[u8],
) -> Result<(), TransportError> {
    let mut payload = Vec::with_capacity(text.len() + 1);
    payload.extend_from_slice(text);
    payload.push(0);
    send_message(transport, OpCode::ReportString, seq_id, &payload)
}

/// Send a value reported by injected code.
pub fn send_report_value<T: Transport + ?Sized>(
    transport: &mut T,
    seq_id: u32,
    value: u64,
) -> Result<(), TransportError> {
    send_message(transport, OpCode::ReportValue, seq_id, &value.to_le_bytes())
}
