//! Integration tests for the TCP device simulator and the export generator.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use ez_device::{Device, DeviceConfig};
use ez_protocol::{put_cstr, put_slot, Frame, FrameCodec, Incoming, MessageHeader, OpCode, SetupMessage};
use ez_runner::serve;
use ez_symbols::SymbolImage;

// ============================================================================
// Host Helpers
// ============================================================================

/// Minimal host side of the link.
struct Host {
    stream: TcpStream,
    codec: FrameCodec,
    saw_magic: bool,
}

impl Host {
    fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to simulator");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set timeout");
        Host {
            stream,
            codec: FrameCodec::new(),
            saw_magic: false,
        }
    }

    fn next_frame(&mut self) -> Frame {
        loop {
            match self.codec.decode().expect("valid frame") {
                Some(Incoming::Magic) => self.saw_magic = true,
                Some(Incoming::Frame(frame)) => return frame,
                None => {
                    let mut buf = [0u8; 512];
                    let n = self.stream.read(&mut buf).expect("read from simulator");
                    assert!(n > 0, "simulator closed the connection early");
                    self.codec.push(&buf[..n]);
                }
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).expect("write to simulator");
    }
}

fn lookup_payload(names: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    put_slot(&mut buf, names.len() as u64);
    for name in names {
        put_cstr(&mut buf, name.as_bytes());
    }
    buf
}

fn spawn_simulator(sessions: usize) -> (std::net::SocketAddr, thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = thread::spawn(move || {
        let image = SymbolImage::from_symbols([("printf", 0x0800_0100u32), ("puts", 0x0800_0180)])
            .expect("valid symbols");
        let mut device = Device::new(DeviceConfig::default(), image.table()).expect("valid device");
        device.boot();
        let shutdown = AtomicBool::new(false);
        serve(&mut device, &listener, &shutdown, Some(sessions))
    });
    (addr, handle)
}

// ============================================================================
// Simulator
// ============================================================================

#[test]
fn test_tcp_session_lookup_and_hangup() {
    let (addr, handle) = spawn_simulator(1);
    let mut host = Host::connect(addr);

    let setup = host.next_frame();
    assert!(host.saw_magic);
    assert_eq!(setup.header.op_code, OpCode::Setup);
    let setup = SetupMessage::decode(&setup.payload).expect("setup decodes");
    let lookup = setup.symbol("__ez_clang_rpc_lookup").expect("bootstrap symbol");

    host.send(&FrameCodec::encode_call(1, lookup, &lookup_payload(&["puts", "nope"])));
    let result = host.next_frame();
    assert_eq!(result.header.op_code, OpCode::Result);
    assert_eq!(result.header.seq_id, 1);
    assert_eq!(&result.payload[..8], &0x0800_0180u64.to_le_bytes());
    assert_eq!(&result.payload[8..], &0u64.to_le_bytes());

    host.send(&FrameCodec::encode_hangup(2));
    let hangup = host.next_frame();
    assert_eq!(hangup.header.op_code, OpCode::Hangup);
    assert_eq!(hangup.payload, [0]);

    assert_eq!(handle.join().expect("simulator thread"), vec![0]);
}

#[test]
fn test_tcp_oversized_payload_is_flushed() {
    let (addr, handle) = spawn_simulator(1);
    let mut host = Host::connect(addr);
    let setup = host.next_frame();
    let lookup = SetupMessage::decode(&setup.payload)
        .expect("setup decodes")
        .symbol("__ez_clang_rpc_lookup")
        .expect("bootstrap symbol");

    let mut oversized = MessageHeader::call(7, lookup, 5000).encode().to_vec();
    oversized.extend_from_slice(&[0xAB; 200]);
    host.send(&oversized);

    let error = host.next_frame();
    assert_eq!(error.header.seq_id, 7);
    assert_eq!(
        error.payload_text(),
        "Message payload (5000 bytes) exceeds buffer size (1024 bytes)"
    );

    host.send(&FrameCodec::encode_call(8, lookup, &lookup_payload(&["printf"])));
    let result = host.next_frame();
    assert_eq!(result.header.seq_id, 8);
    assert_eq!(result.payload, 0x0800_0100u64.to_le_bytes());

    host.send(&FrameCodec::encode_hangup(9));
    assert_eq!(host.next_frame().header.op_code, OpCode::Hangup);
    assert_eq!(handle.join().expect("simulator thread"), vec![0]);
}

#[test]
fn test_tcp_sessions_are_sequential() {
    let (addr, handle) = spawn_simulator(2);

    for _ in 0..2 {
        let mut host = Host::connect(addr);
        assert_eq!(host.next_frame().header.op_code, OpCode::Setup);
        host.send(&FrameCodec::encode_hangup(1));
        assert_eq!(host.next_frame().header.op_code, OpCode::Hangup);
    }

    assert_eq!(handle.join().expect("simulator thread"), vec![0, 0]);
}

#[test]
fn test_tcp_disconnect_ends_session() {
    let (addr, handle) = spawn_simulator(1);
    {
        let mut host = Host::connect(addr);
        assert_eq!(host.next_frame().header.op_code, OpCode::Setup);
    }
    assert_eq!(handle.join().expect("simulator thread"), vec![1]);
}

// ============================================================================
// Export Generator
// ============================================================================

fn elf_sections(entries: &[(&str, u32)]) -> (Vec<u8>, Vec<u8>) {
    let mut symtab = vec![0u8; 16];
    let mut strtab = vec![0u8];
    for (name, value) in entries {
        symtab.extend_from_slice(&(strtab.len() as u32).to_le_bytes());
        symtab.extend_from_slice(&value.to_le_bytes());
        symtab.extend_from_slice(&[0u8; 8]);
        strtab.extend_from_slice(name.as_bytes());
        strtab.push(0);
    }
    (symtab, strtab)
}

#[test]
fn test_ez_exports_binary() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (symtab, strtab) = elf_sections(&[
        ("setup", 0x0800_0400),
        ("printf", 0x0800_0100),
        ("internal_helper", 0x0800_0900),
        ("abort", 0x0800_0050),
    ]);
    let strtab_path = dir.path().join("firmware.strtab.section");
    let symtab_path = dir.path().join("firmware.symtab.section");
    let allow_path = dir.path().join("exports.txt");
    let log_path = dir.path().join("exports.log");
    std::fs::write(&strtab_path, &strtab).expect("write strtab");
    std::fs::write(&symtab_path, &symtab).expect("write symtab");
    std::fs::write(&allow_path, "printf\nabort\n\nsetup\n").expect("write allow-list");

    let status = Command::new(env!("CARGO_BIN_EXE_ez-exports"))
        .arg("-q")
        .arg("--log")
        .arg(&log_path)
        .arg(&strtab_path)
        .arg(&symtab_path)
        .arg(&allow_path)
        .status()
        .expect("run ez-exports");
    assert!(status.success());

    let image = SymbolImage::load(
        &dir.path().join("firmware.symtab.exports"),
        &dir.path().join("firmware.strtab.exports"),
    )
    .expect("outputs load");
    assert_eq!(image.len(), 3);
    assert_eq!(image.table().lookup(b"abort"), 0x0800_0050);
    assert_eq!(image.table().lookup(b"internal_helper"), 0);

    let log = std::fs::read_to_string(&log_path).expect("log written");
    assert_eq!(
        log,
        "08000050   abort\n08000100   printf\n08000400   setup\n"
    );
}

#[test]
fn test_ez_exports_warns_on_duplicate_strings() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (symtab, mut strtab) = elf_sections(&[("main", 0x0800_0010)]);
    strtab.extend_from_slice(b"main\0");
    let strtab_path = dir.path().join("dup.strtab.section");
    let symtab_path = dir.path().join("dup.symtab.section");
    let allow_path = dir.path().join("exports.txt");
    std::fs::write(&strtab_path, &strtab).expect("write strtab");
    std::fs::write(&symtab_path, &symtab).expect("write symtab");
    std::fs::write(&allow_path, "main\n").expect("write allow-list");

    let output = Command::new(env!("CARGO_BIN_EXE_ez-exports"))
        .env_remove("RUST_LOG")
        .arg("-q")
        .arg(&strtab_path)
        .arg(&symtab_path)
        .arg(&allow_path)
        .output()
        .expect("run ez-exports");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("duplicate string in strtab: main"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_ez_exports_rejects_bad_symtab() {
    let dir = tempfile::tempdir().expect("temp dir");
    let strtab_path = dir.path().join("fw.strtab.section");
    let symtab_path = dir.path().join("fw.symtab.section");
    let allow_path = dir.path().join("exports.txt");
    std::fs::write(&strtab_path, b"\0main\0").expect("write strtab");
    std::fs::write(&symtab_path, [0u8; 20]).expect("write symtab");
    std::fs::write(&allow_path, "main\n").expect("write allow-list");

    let status = Command::new(env!("CARGO_BIN_EXE_ez-exports"))
        .arg("-q")
        .arg(&strtab_path)
        .arg(&symtab_path)
        .arg(&allow_path)
        .status()
        .expect("run ez-exports");
    assert!(!status.success());
    assert!(!dir.path().join("fw.symtab.exports").exists());
}
