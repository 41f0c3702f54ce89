//! Builtin RPC endpoints.
//!
//! | Endpoint                           | Payload                          | Result                 |
//! |------------------------------------|----------------------------------|------------------------|
//! | `__ez_clang_rpc_lookup`            | `u64 count`, `count` x name`\0`   | `count` x `u64` address |
//! | `__ez_clang_rpc_commit`            | `u64 addr`, `u64 len`, bytes     | empty                  |
//! | `__ez_clang_rpc_mem_read_cstring`  | `u64 addr`                       | string`\0`              |
//! | `__ez_clang_rpc_execute`           | `u64 addr`                       | error text             |
//!
//! Malformed requests get error text in the Result, the session goes on.

use ez_protocol::{Reader, SLOT_SIZE};
use ez_symbols::BuiltinAddresses;
use tracing::debug;

use crate::error::{FatalError, RegistryError};
use crate::handler::{Env, HandlerRegistry};
use crate::response::ResponseWriter;

/// Register the builtin endpoints at their configured addresses.
pub fn install(
    registry: &mut HandlerRegistry,
    addrs: &BuiltinAddresses,
) -> Result<(), RegistryError> {
    registry.register_fn(addrs.rpc_lookup, lookup)?;
    registry.register_fn(addrs.rpc_commit, commit)?;
    registry.register_fn(addrs.rpc_execute, execute)?;
    registry.register_fn(addrs.rpc_mem_read_cstring, mem_read_cstring)?;
    Ok(())
}

/// Resolve a batch of names.
pub fn lookup(
    env: &mut Env<'_>,
    input: &[u8],
    resp: &mut ResponseWriter<'_>,
) -> Result<(), FatalError> {
    let mut reader = Reader::new(input);
    let count = match reader.read_slot() {
        Ok(count) => count,
        Err(err) => {
            resp.error(format_args!("Malformed lookup request: {}", err));
            return Ok(());
        }
    };

    let needed = usize::try_from(count)
        .ok()
        .and_then(|n| n.checked_mul(SLOT_SIZE));
    match needed {
        Some(needed) if needed <= resp.remaining() => {}
        _ => {
            resp.error(format_args!(
                "Lookup of {} symbols exceeds response capacity ({} bytes)",
                count,
                resp.remaining()
            ));
            return Ok(());
        }
    }

    for _ in 0..count {
        let name = match reader.read_cstr() {
            Ok(name) => name,
            Err(err) => {
                resp.error(format_args!("Malformed lookup request: {}", err));
                return Ok(());
            }
        };
        let address = env.resolver().resolve(name)?;
        debug!(
            name = %String::from_utf8_lossy(name),
            address = format_args!("{:#010x}", address),
            "lookup"
        );
        resp.put_u64(u64::from(address))?;
    }
    Ok(())
}

/// Copy code into the code buffer.
pub fn commit(
    env: &mut Env<'_>,
    input: &[u8],
    resp: &mut ResponseWriter<'_>,
) -> Result<(), FatalError> {
    let mut reader = Reader::new(input);
    let request = reader.read_u32("address").and_then(|address| {
        let len = reader.read_slot()?;
        let bytes = reader.read_bytes(usize::try_from(len).unwrap_or(usize::MAX))?;
        Ok((address, bytes))
    });
    let (address, bytes) = match request {
        Ok(request) => request,
        Err(err) => {
            resp.error(format_args!("Malformed commit request: {}", err));
            return Ok(());
        }
    };

    match env.code_mut().write(address, bytes) {
        Ok(()) => debug!(
            address = format_args!("{:#010x}", address),
            len = bytes.len(),
            "committed code"
        ),
        Err(err) => resp.error(format_args!("{}", err)),
    }
    Ok(())
}

/// Return the string stored at an address in the code buffer.
pub fn mem_read_cstring(
    env: &mut Env<'_>,
    input: &[u8],
    resp: &mut ResponseWriter<'_>,
) -> Result<(), FatalError> {
    let address = match Reader::new(input).read_u32("address") {
        Ok(address) => address,
        Err(err) => {
            resp.error(format_args!("Malformed memory read request: {}", err));
            return Ok(());
        }
    };

    match env.code().read_cstring(address) {
        Ok(text) if text.len() < resp.remaining() => resp.put_cstr(text)?,
        Ok(text) => resp.error(format_args!(
            "String at {:#010x} ({} bytes) exceeds response capacity ({} bytes)",
            address,
            text.len(),
            resp.remaining()
        )),
        Err(err) => resp.error(format_args!("{}", err)),
    }
    Ok(())
}

/// Run committed code.
///
/// A simulated device has no target CPU, so every request is refused.
pub fn execute(
    env: &mut Env<'_>,
    input: &[u8],
    resp: &mut ResponseWriter<'_>,
) -> Result<(), FatalError> {
    let address = match Reader::new(input).read_u32("address") {
        Ok(address) => address,
        Err(err) => {
            resp.error(format_args!("Malformed execute request: {}", err));
            return Ok(());
        }
    };

    if env.code().contains(address, 1) {
        resp.error(format_args!(
            "Cannot execute code at {:#010x}: no target processor",
            address
        ));
    } else {
        resp.error(format_args!(
            "Cannot execute code at {:#010x}: outside the code buffer",
            address
        ));
    }
    Ok(())
}
