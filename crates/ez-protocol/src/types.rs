//! Common types used in the protocol.

use crate::constants::*;

/// Message opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Session parameters, device → host.
    Setup,
    /// End of session.
    Hangup,
    /// Reply to a Call.
    Result,
    /// Handler invocation, host → device.
    Call,
    /// Value reported by injected code.
    ReportValue,
    /// String reported by injected code.
    ReportString,
    /// Opcode outside the known range.
    Unknown(u32),
}

impl OpCode {
    /// Whether the device accepts this opcode as an inbound message.
    pub fn is_inbound(&self) -> bool {
        matches!(self, OpCode::Call | OpCode::Hangup)
    }
}

impl From<u32> for OpCode {
    fn from(value: u32) -> Self {
        match value {
            OPC_SETUP => OpCode::Setup,
            OPC_HANGUP => OpCode::Hangup,
            OPC_RESULT => OpCode::Result,
            OPC_CALL => OpCode::Call,
            OPC_REPORT_VALUE => OpCode::ReportValue,
            OPC_REPORT_STRING => OpCode::ReportString,
            _ => OpCode::Unknown(value),
        }
    }
}

impl From<OpCode> for u32 {
    fn from(value: OpCode) -> Self {
        match value {
            OpCode::Setup => OPC_SETUP,
            OpCode::Hangup => OPC_HANGUP,
            OpCode::Result => OPC_RESULT,
            OpCode::Call => OPC_CALL,
            OpCode::ReportValue => OPC_REPORT_VALUE,
            OpCode::ReportString => OPC_REPORT_STRING,
            OpCode::Unknown(v) => v,
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpCode::Unknown(v) => write!(f, "{}", v),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A named address on the device.
///
/// Names are raw bytes compared byte-exactly; tables holding them are
/// immutable once the firmware is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol<'a> {
    /// Symbol name, without terminator.
    pub name: &'a [u8],
    /// Device address.
    pub address: u32,
}

impl<'a> Symbol<'a> {
    /// Create a symbol from a string name.
    pub const fn new(name: &'a str, address: u32) -> Self {
        Symbol {
            name: name.as_bytes(),
            address,
        }
    }

    /// Name as text, lossy for non-UTF-8 names.
    pub fn name_lossy(&self) -> std::borrow::Cow<'a, str> {
        String::from_utf8_lossy(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_conversion() {
        for raw in 0..6u32 {
            let op = OpCode::from(raw);
            assert!(!matches!(op, OpCode::Unknown(_)));
            assert_eq!(u32::from(op), raw);
        }
        assert_eq!(OpCode::from(9), OpCode::Unknown(9));
        assert_eq!(u32::from(OpCode::Unknown(9)), 9);
    }

    #[test]
    fn test_inbound_opcodes() {
        assert!(OpCode::Call.is_inbound());
        assert!(OpCode::Hangup.is_inbound());
        assert!(!OpCode::Setup.is_inbound());
        assert!(!OpCode::Result.is_inbound());
        assert!(!OpCode::ReportString.is_inbound());
        assert!(!OpCode::Unknown(42).is_inbound());
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(OpCode::Call.to_string(), "Call");
        assert_eq!(OpCode::Unknown(17).to_string(), "17");
    }
}
