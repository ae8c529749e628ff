// Integration tests against a Linux pseudo-terminal pair. The session opens
// the slave side; the test plays the remote device on the master side.
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::thread;
use std::time::{Duration, Instant};

use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt, PtyMaster};

use posix_serial::serial::{
    BaudRate, CanonicalMode, DataLength, ErrorKind, FlowControl, Parity, PortSettings, Serial, SerialError,
    StopBits, Terminator,
};

struct PseudoTerminal {
    master: PtyMaster,
    // Held open so the pair stays up while the session reopens the slave.
    _slave: File,
    slave_port: String,
}

impl PseudoTerminal {
    fn new() -> Self {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).expect("open master pseudo-terminal");
        grantpt(&master).expect("grantpt");
        unlockpt(&master).expect("unlockpt");
        let slave_port = ptsname_r(&master).expect("slave pseudo-terminal name");
        let slave = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&slave_port)
            .expect("open slave pseudo-terminal");
        Self { master, _slave: slave, slave_port }
    }

    fn send(&mut self, data: &[u8]) {
        self.master.write_all(data).expect("write to master end");
        self.master.flush().expect("flush master end");
        thread::sleep(Duration::from_millis(100));
    }

    fn open_session(&self) -> Serial {
        let mut serial = Serial::new();
        serial.open(&self.slave_port).expect("open slave port");
        serial.set_baud_rate(BaudRate::B9600).expect("set baud rate");
        serial
    }
}

#[test]
fn open_close_port() {
    let pty = PseudoTerminal::new();
    let mut serial = Serial::new();
    assert!(!serial.is_open());

    serial.open(&pty.slave_port).unwrap();
    assert!(serial.is_open());
    assert_eq!(serial.port_path(), Some(pty.slave_port.as_str()));

    serial.close().unwrap();
    assert!(!serial.is_open());
    serial.close().unwrap();
}

#[test]
fn reopen_releases_previous_handle() {
    let pty = PseudoTerminal::new();
    let mut serial = Serial::new();
    for _ in 0..3 {
        serial.open(&pty.slave_port).unwrap();
        assert!(serial.is_open());
    }
    serial.close().unwrap();
}

#[test]
fn with_port_applies_default_baud_rate() {
    let pty = PseudoTerminal::new();
    let serial = Serial::with_port(&pty.slave_port).unwrap();
    assert_eq!(serial.get_baud_rate().unwrap(), 9600);
}

#[test]
fn open_missing_port_leaves_session_closed() {
    let mut serial = Serial::new();
    let err = serial.open("/dev/this-port-does-not-exist").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PortNotFound);
    assert_eq!(
        err.to_string(),
        "Error opening port /dev/this-port-does-not-exist: No such file or directory"
    );
    assert!(!serial.is_open());
    serial.close().unwrap();
    serial.close().unwrap();
}

#[test]
fn set_and_get_every_standard_baud_rate() {
    let pty = PseudoTerminal::new();
    let mut serial = pty.open_session();

    for rate in BaudRate::ALL {
        serial.set_baud_rate(rate).unwrap();
        assert_eq!(serial.get_baud_rate().unwrap(), rate.as_u32(), "rate {:?}", rate);
    }

    serial.set_baud_rate(115200u32).unwrap();
    assert_eq!(serial.get_baud_rate().unwrap(), 115200);
}

#[test]
fn line_parameters_read_back() {
    let pty = PseudoTerminal::new();
    let mut serial = pty.open_session();

    // The pty driver forces CS8 and clears PARENB, so only parameters it
    // keeps are read back here.
    serial.set_parity(Parity::Disabled).unwrap();
    assert_eq!(serial.get_parity().unwrap(), Parity::Disabled);

    serial.set_stop_bits(StopBits::Two).unwrap();
    assert_eq!(serial.get_stop_bits().unwrap(), StopBits::Two);
    serial.set_stop_bits(StopBits::One).unwrap();
    assert_eq!(serial.get_stop_bits().unwrap(), StopBits::One);

    serial.set_data_length(DataLength::Eight).unwrap();
    assert_eq!(serial.data_length(), DataLength::Eight);

    serial.set_flow_control(FlowControl::Software).unwrap();
    assert_eq!(serial.get_flow_control().unwrap(), FlowControl::Software);
    serial.set_flow_control(FlowControl::None).unwrap();
    assert_eq!(serial.get_flow_control().unwrap(), FlowControl::None);

    // Each setter re-fetches, so the baud rate set earlier survives.
    assert_eq!(serial.get_baud_rate().unwrap(), 9600);
}

#[test]
fn read_timeout_is_stored() {
    let pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    assert_eq!(serial.read_timeout(), Some(Duration::from_millis(1000)));

    serial.set_read_timeout(Some(Duration::from_millis(1500)));
    assert_eq!(serial.read_timeout(), Some(Duration::from_millis(1500)));

    serial.set_write_timeout(None);
    assert_eq!(serial.write_timeout(), None);
}

#[test]
fn available_bytes_counts_pending_input() {
    let mut pty = PseudoTerminal::new();
    let serial = pty.open_session();
    assert_eq!(serial.available_bytes().unwrap(), 0);

    pty.send(b"Hello World!\n");
    assert_eq!(serial.available_bytes().unwrap(), 13);
}

#[test]
fn read_canonical_line() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();

    pty.send(b"Hello World!\n");
    assert_eq!(serial.available_bytes().unwrap(), 13);

    let mut buffer = Vec::new();
    let n = serial.read(&mut buffer).unwrap();
    assert_eq!(n, 13);
    assert_eq!(buffer, b"Hello World!\n");
}

#[test]
fn read_in_non_canonical_mode_is_rejected() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_canonical_mode(CanonicalMode::Disabled).unwrap();

    pty.send(b"Non-Canonical Test\n");

    let err = serial.read(&mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoError);
    assert_eq!(
        err.to_string(),
        "read() is not supported in non-canonical mode; use read_bytes() or read_until() instead"
    );
}

#[test]
fn read_times_out_without_data() {
    let pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_read_timeout(Some(Duration::from_millis(100)));

    let start = Instant::now();
    let err = serial.read(&mut Vec::new()).unwrap_err();
    assert!(matches!(err, SerialError::Timeout(_)));
    assert_eq!(err.to_string(), "Read operation timed out after 100 milliseconds");
    assert!(start.elapsed() >= Duration::from_millis(90));
}

#[test]
fn zero_timeout_returns_immediately() {
    let pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_read_timeout(Some(Duration::ZERO));

    let start = Instant::now();
    let err = serial.read(&mut Vec::new()).unwrap_err();
    assert!(err.is_timeout());
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn read_bytes_non_canonical() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_canonical_mode(CanonicalMode::Disabled).unwrap();

    let message = b"ReadBytes Test!";
    pty.send(message);

    let mut buffer = Vec::new();
    let n = serial.read_bytes(&mut buffer, message.len()).unwrap();
    assert_eq!(n, message.len());
    assert_eq!(buffer, message);
}

#[test]
fn read_bytes_rejects_zero_count() {
    let pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_canonical_mode(CanonicalMode::Disabled).unwrap();

    let err = serial.read_bytes(&mut Vec::new(), 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.to_string(), "Number of bytes requested must be greater than zero");
}

#[test]
fn read_bytes_in_canonical_mode_is_rejected() {
    let pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_canonical_mode(CanonicalMode::Enabled).unwrap();

    let err = serial.read_bytes(&mut Vec::new(), 5).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoError);
    assert_eq!(
        err.to_string(),
        "read_bytes() is not supported in canonical mode; use read() or read_until() instead"
    );
}

#[test]
fn read_until_stops_at_terminator() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();

    pty.send(b"Read Until! Test!\n");

    let mut buffer = Vec::new();
    let n = serial.read_until(&mut buffer, b'!').unwrap();
    assert_eq!(n, 11);
    assert_eq!(buffer, b"Read Until!");

    // The rest of the line is still queued for the next call.
    let n = serial.read_until(&mut buffer, b'!').unwrap();
    assert_eq!(buffer, b" Test!");
    assert_eq!(n, 6);
}

#[test]
fn read_until_uses_session_terminator() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_canonical_mode(CanonicalMode::Disabled).unwrap();
    serial.set_terminator(Terminator::Byte(b';'));

    pty.send(b"AT+OK;trailing");

    let mut buffer = Vec::new();
    serial.read_until_terminator(&mut buffer).unwrap();
    assert_eq!(buffer, b"AT+OK;");
    assert_eq!(serial.available_bytes().unwrap(), 8);
}

#[test]
fn read_until_times_out_without_terminator() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_read_timeout(Some(Duration::from_millis(100)));

    pty.send(b"Read Until Test");

    let start = Instant::now();
    let err = serial.read_until(&mut Vec::new(), b'!').unwrap_err();
    let elapsed = start.elapsed();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(elapsed >= Duration::from_millis(90), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(300), "returned after {:?}", elapsed);
}

#[test]
fn read_until_overflows_safe_size() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_max_safe_read_size(10);
    assert_eq!(serial.max_safe_read_size(), 10);

    let mut message = vec![b'a'; 15];
    message.push(b'\n');
    pty.send(&message);

    let mut buffer = Vec::new();
    let err = serial.read_until(&mut buffer, b'\n').unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BufferOverflow);
    assert_eq!(
        err.to_string(),
        "Read buffer exceeded maximum size limit of 10 bytes without finding terminator"
    );
}

#[test]
fn write_sends_bytes_unchanged() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();
    serial.set_baud_rate(115200u32).unwrap();

    serial.write(b"Test Write Data").unwrap();
    thread::sleep(Duration::from_millis(50));

    let mut buffer = [0u8; 100];
    let n = pty.master.read(&mut buffer).unwrap();
    assert_eq!(&buffer[..n], b"Test Write Data");
}

#[test]
fn write_with_terminator_appends_one_byte() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();

    serial.write_with_terminator(b"PING", Terminator::Eot).unwrap();
    thread::sleep(Duration::from_millis(50));

    let mut buffer = [0u8; 16];
    let n = pty.master.read(&mut buffer).unwrap();
    assert_eq!(&buffer[..n], b"PING\x04");
}

#[test]
fn flush_input_discards_pending_data() {
    let mut pty = PseudoTerminal::new();
    let mut serial = pty.open_session();

    pty.send(b"stale line\n");
    assert_eq!(serial.available_bytes().unwrap(), 11);

    serial.flush_input_buffer().unwrap();
    assert_eq!(serial.available_bytes().unwrap(), 0);
}

#[test]
fn settings_roundtrip_through_session() {
    let pty = PseudoTerminal::new();
    let mut serial = pty.open_session();

    let settings = PortSettings::from_json_str(
        r#"{
            "baud_rate": 57600,
            "stop_bits": "Two",
            "canonical_mode": "Disabled",
            "terminator": "Cr",
            "read_timeout_ms": 250,
            "min_chars": 4,
            "max_safe_read_size": 512
        }"#,
    )
    .unwrap();
    serial.apply_settings(&settings).unwrap();

    assert_eq!(serial.canonical_mode(), CanonicalMode::Disabled);
    assert_eq!(serial.min_number_char_read(), 4);
    assert_eq!(serial.read_timeout(), Some(Duration::from_millis(250)));

    let current = serial.settings().unwrap();
    assert_eq!(current.baud_rate, 57600);
    assert_eq!(current.stop_bits, StopBits::Two);
    assert_eq!(current.canonical_mode, CanonicalMode::Disabled);
    assert_eq!(current.terminator, Terminator::Cr);
    assert_eq!(current.min_chars, 4);
    assert_eq!(current.max_safe_read_size, 512);
}

#[test]
fn setters_fail_on_closed_session() {
    let mut serial = Serial::new();
    assert!(matches!(serial.set_parity(Parity::Enabled), Err(SerialError::NotOpen)));
    assert!(matches!(serial.set_canonical_mode(CanonicalMode::Disabled), Err(SerialError::NotOpen)));
    assert!(matches!(serial.get_baud_rate(), Err(SerialError::NotOpen)));
    assert!(matches!(serial.flush_input_buffer(), Err(SerialError::NotOpen)));
}
