use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};

use super::attributes::TerminalAttributes;
use super::settings::PortSettings;
use super::sys::{PosixSys, SysCalls};
use super::types::{BaudRate, CanonicalMode, DataLength, FlowControl, Parity, StopBits, Terminator};
use super::{io_reason, os_message, strerror, Result, SerialError};

pub const DEFAULT_BAUD_RATE: BaudRate = BaudRate::B9600;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_SAFE_READ_SIZE: usize = 2048;

/// Pause before retrying a read that reported `EAGAIN`.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

/// A blocking serial port session.
///
/// The session owns at most one descriptor. Terminal attributes are never
/// cached: every setter fetches the current record from the kernel, changes
/// its own fields and commits it back. Timeouts follow one convention:
/// `None` blocks indefinitely, `Some(Duration::ZERO)` returns at once when
/// nothing is ready, anything else bounds the wait.
pub struct Serial {
    fd: Option<OwnedFd>,
    port_path: Option<String>,
    sys: Box<dyn SysCalls>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    canonical_mode: CanonicalMode,
    data_length: DataLength,
    terminator: Terminator,
    min_chars_to_read: u8,
    max_safe_read_size: usize,
}

impl Serial {
    pub fn new() -> Self {
        Self::with_syscalls(Box::new(PosixSys))
    }

    /// Creates a closed session whose OS calls go through `sys`.
    pub fn with_syscalls(sys: Box<dyn SysCalls>) -> Self {
        Self {
            fd: None,
            port_path: None,
            sys,
            read_timeout: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
            canonical_mode: CanonicalMode::Enabled,
            data_length: DataLength::Eight,
            terminator: Terminator::Lf,
            min_chars_to_read: 0,
            max_safe_read_size: DEFAULT_MAX_SAFE_READ_SIZE,
        }
    }

    /// Opens `port` and applies the default baud rate.
    pub fn with_port(port: &str) -> Result<Self> {
        let mut serial = Self::new();
        serial.open(port)?;
        serial.set_baud_rate(DEFAULT_BAUD_RATE)?;
        Ok(serial)
    }

    /// Open the device at `port`, releasing any descriptor already held.
    pub fn open(&mut self, port: &str) -> Result<()> {
        if self.fd.is_some() {
            self.close()?;
        }

        // O_NONBLOCK only keeps open() itself from hanging on modem lines.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(port)
            .map_err(|e| open_error(port, &e))?;
        let fd: OwnedFd = file.into();

        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(OFlag::empty()))
            .map_err(|e| SerialError::Io(os_message(&format!("Error configuring port {}", port), e)))?;

        match self.sys.get_attributes(fd.as_raw_fd()) {
            Ok(attrs) => self.canonical_mode = attrs.canonical_mode(),
            Err(e) => log::debug!("{} has no terminal attributes: {}", port, strerror(e)),
        }

        self.fd = Some(fd);
        self.port_path = Some(port.to_string());

        log::info!("Opened serial port {}", port);
        Ok(())
    }

    /// Release the descriptor. Closing a closed session does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(fd) = self.fd.take() else {
            return Ok(());
        };
        let port = self.port_path.take().unwrap_or_default();

        nix::unistd::close(fd.into_raw_fd())
            .map_err(|e| SerialError::Io(os_message("Error closing port", e)))?;

        log::info!("Closed serial port {}", port);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    pub fn port_path(&self) -> Option<&str> {
        self.port_path.as_deref()
    }

    fn raw_fd(&self) -> Result<RawFd> {
        self.fd.as_ref().map(|fd| fd.as_raw_fd()).ok_or(SerialError::NotOpen)
    }

    fn fetch_attributes(&self) -> Result<TerminalAttributes> {
        let fd = self.raw_fd()?;
        self.sys
            .get_attributes(fd)
            .map_err(|e| SerialError::Configuration(os_message("Error getting terminal attributes", e)))
    }

    fn commit_attributes(&self, attrs: &TerminalAttributes) -> Result<()> {
        let fd = self.raw_fd()?;
        self.sys
            .set_attributes(fd, attrs)
            .map_err(|e| SerialError::Configuration(os_message("Error setting terminal attributes", e)))
    }

    /// Fetch, edit, commit.
    fn modify_attributes<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut TerminalAttributes),
    {
        let mut attrs = self.fetch_attributes()?;
        edit(&mut attrs);
        self.commit_attributes(&attrs)
    }

    // ---- configuration ----

    pub fn set_baud_rate(&mut self, rate: impl Into<u32>) -> Result<()> {
        let rate = rate.into();
        if rate == 0 {
            return Err(SerialError::InvalidArgument("Baud rate must be greater than zero".to_string()));
        }
        self.modify_attributes(|attrs| attrs.set_baud_rate(rate))?;
        log::debug!("Baud rate set to {}", rate);
        Ok(())
    }

    pub fn get_baud_rate(&self) -> Result<u32> {
        Ok(self.fetch_attributes()?.input_speed())
    }

    pub fn set_data_length(&mut self, length: DataLength) -> Result<()> {
        self.modify_attributes(|attrs| attrs.set_data_length(length))?;
        self.data_length = length;
        log::debug!("Data length set to {} bits", length.bits());
        Ok(())
    }

    /// Last data length committed through this session.
    pub fn data_length(&self) -> DataLength {
        self.data_length
    }

    pub fn get_data_length(&self) -> Result<DataLength> {
        Ok(self.fetch_attributes()?.data_length())
    }

    pub fn set_parity(&mut self, parity: Parity) -> Result<()> {
        self.modify_attributes(|attrs| attrs.set_parity(parity))?;
        log::debug!("Parity set to {:?}", parity);
        Ok(())
    }

    pub fn get_parity(&self) -> Result<Parity> {
        Ok(self.fetch_attributes()?.parity())
    }

    pub fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<()> {
        self.modify_attributes(|attrs| attrs.set_stop_bits(stop_bits))?;
        log::debug!("Stop bits set to {:?}", stop_bits);
        Ok(())
    }

    pub fn get_stop_bits(&self) -> Result<StopBits> {
        Ok(self.fetch_attributes()?.stop_bits())
    }

    pub fn set_flow_control(&mut self, flow_control: FlowControl) -> Result<()> {
        self.modify_attributes(|attrs| attrs.set_flow_control(flow_control))?;
        log::debug!("Flow control set to {:?}", flow_control);
        Ok(())
    }

    pub fn get_flow_control(&self) -> Result<FlowControl> {
        Ok(self.fetch_attributes()?.flow_control())
    }

    pub fn set_canonical_mode(&mut self, mode: CanonicalMode) -> Result<()> {
        self.modify_attributes(|attrs| attrs.set_canonical_mode(mode))?;
        self.canonical_mode = mode;
        log::debug!("Canonical mode {:?}", mode);
        Ok(())
    }

    pub fn canonical_mode(&self) -> CanonicalMode {
        self.canonical_mode
    }

    pub fn set_terminator(&mut self, terminator: Terminator) {
        self.terminator = terminator;
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    /// VMIN: bytes a non-canonical read waits for.
    pub fn set_min_number_char_read(&mut self, count: u8) -> Result<()> {
        self.modify_attributes(|attrs| attrs.set_min_chars(count))?;
        self.min_chars_to_read = count;
        Ok(())
    }

    pub fn min_number_char_read(&self) -> u8 {
        self.min_chars_to_read
    }

    /// VTIME: non-canonical inter-byte timer, in 100 ms steps.
    pub fn set_inter_byte_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.modify_attributes(|attrs| attrs.set_inter_byte_timeout(timeout))
    }

    pub fn set_max_safe_read_size(&mut self, size: usize) {
        self.max_safe_read_size = size;
    }

    pub fn max_safe_read_size(&self) -> usize {
        self.max_safe_read_size
    }

    /// Apply every field of `settings`, stopping at the first failure.
    pub fn apply_settings(&mut self, settings: &PortSettings) -> Result<()> {
        self.set_baud_rate(settings.baud_rate)?;
        self.set_data_length(settings.data_length)?;
        self.set_parity(settings.parity)?;
        self.set_stop_bits(settings.stop_bits)?;
        self.set_flow_control(settings.flow_control)?;
        self.set_canonical_mode(settings.canonical_mode)?;
        self.set_min_number_char_read(settings.min_chars)?;
        self.set_inter_byte_timeout(Duration::from_millis(settings.inter_byte_timeout_ms))?;
        self.set_terminator(settings.terminator);
        self.set_read_timeout(settings.read_timeout());
        self.set_write_timeout(settings.write_timeout());
        self.set_max_safe_read_size(settings.max_safe_read_size);
        Ok(())
    }

    /// Snapshot of the current configuration, line parameters read back
    /// from the kernel.
    pub fn settings(&self) -> Result<PortSettings> {
        let attrs = self.fetch_attributes()?;
        Ok(PortSettings {
            baud_rate: attrs.input_speed(),
            data_length: attrs.data_length(),
            parity: attrs.parity(),
            stop_bits: attrs.stop_bits(),
            flow_control: attrs.flow_control(),
            canonical_mode: attrs.canonical_mode(),
            terminator: self.terminator,
            read_timeout_ms: self.read_timeout.map(duration_ms),
            write_timeout_ms: self.write_timeout.map(duration_ms),
            min_chars: attrs.min_chars(),
            inter_byte_timeout_ms: duration_ms(attrs.inter_byte_timeout()),
            max_safe_read_size: self.max_safe_read_size,
        })
    }

    // ---- I/O ----

    /// Write `data` exactly as given, continuing after short writes until
    /// every byte is out.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(SerialError::InvalidArgument("Empty buffer passed to write function".to_string()));
        }
        let fd = self.raw_fd()?;
        let start = Instant::now();
        let mut written = 0;

        while written < data.len() {
            if let Some(timeout) = self.write_timeout {
                let remaining = timeout.saturating_sub(start.elapsed());
                if !timeout.is_zero() && remaining.is_zero() {
                    return Err(SerialError::Timeout(format!(
                        "Write operation timed out after {} milliseconds",
                        timeout.as_millis()
                    )));
                }
                if !self.wait_ready(fd, libc::POLLOUT, Some(remaining))? {
                    return Err(SerialError::Timeout(format!(
                        "Write operation timed out after {} milliseconds",
                        timeout.as_millis()
                    )));
                }
            }

            match self.sys.write(fd, &data[written..]) {
                Ok(n) => written += n,
                Err(Errno::EAGAIN) => std::thread::sleep(WOULD_BLOCK_BACKOFF),
                Err(e) => return Err(SerialError::Io(os_message("Error writing to serial port", e))),
            }
        }

        log::trace!("Wrote {} bytes: {}", written, hex::encode(data));
        Ok(())
    }

    /// Write `data` followed by the terminator byte.
    pub fn write_with_terminator(&mut self, data: &[u8], terminator: Terminator) -> Result<()> {
        let mut framed = Vec::with_capacity(data.len() + 1);
        framed.extend_from_slice(data);
        framed.push(terminator.as_byte());
        self.write(&framed)
    }

    /// Read one line in canonical mode.
    ///
    /// Waits for input up to the read timeout, then performs a single read of
    /// at most [`max_safe_read_size`](Self::max_safe_read_size) bytes.
    pub fn read(&mut self, buffer: &mut Vec<u8>) -> Result<usize> {
        if self.canonical_mode == CanonicalMode::Disabled {
            return Err(SerialError::Io(
                "read() is not supported in non-canonical mode; use read_bytes() or read_until() instead"
                    .to_string(),
            ));
        }
        let fd = self.raw_fd()?;

        buffer.clear();
        buffer.resize(self.max_safe_read_size, 0);

        if !self.wait_ready(fd, libc::POLLIN, self.read_timeout)? {
            buffer.clear();
            return Err(SerialError::Timeout(format!(
                "Read operation timed out after {} milliseconds",
                self.read_timeout.unwrap_or_default().as_millis()
            )));
        }

        let n = match self.sys.read(fd, buffer) {
            Ok(n) => n,
            Err(e) => {
                buffer.clear();
                return Err(SerialError::Io(os_message("Error reading from serial port", e)));
            }
        };
        buffer.truncate(n);

        log::trace!("Read {} bytes: {}", n, hex::encode(&buffer[..]));
        Ok(n)
    }

    /// Read up to `count` bytes in non-canonical mode with a single read call.
    /// Fewer bytes may come back.
    pub fn read_bytes(&mut self, buffer: &mut Vec<u8>, count: usize) -> Result<usize> {
        if self.canonical_mode == CanonicalMode::Enabled {
            return Err(SerialError::Io(
                "read_bytes() is not supported in canonical mode; use read() or read_until() instead"
                    .to_string(),
            ));
        }
        if count == 0 {
            return Err(SerialError::InvalidArgument(
                "Number of bytes requested must be greater than zero".to_string(),
            ));
        }
        let fd = self.raw_fd()?;

        buffer.clear();
        buffer.resize(count, 0);

        let n = match self.sys.read(fd, buffer) {
            Ok(n) => n,
            Err(e) => {
                buffer.clear();
                return Err(SerialError::Io(os_message("Error reading from serial port", e)));
            }
        };
        buffer.truncate(n);

        log::trace!("Read {} bytes: {}", n, hex::encode(&buffer[..]));
        Ok(n)
    }

    /// Read byte by byte until `terminator` arrives. The terminator is kept
    /// as the last byte of `buffer`.
    pub fn read_until(&mut self, buffer: &mut Vec<u8>, terminator: u8) -> Result<usize> {
        let fd = self.raw_fd()?;
        buffer.clear();

        let start = Instant::now();
        let mut byte = [0u8; 1];

        loop {
            if buffer.len() >= self.max_safe_read_size {
                return Err(SerialError::BufferOverflow(format!(
                    "Read buffer exceeded maximum size limit of {} bytes without finding terminator",
                    self.max_safe_read_size
                )));
            }

            if let Some(timeout) = self.read_timeout {
                let elapsed = start.elapsed();
                if !timeout.is_zero() && elapsed >= timeout {
                    return Err(SerialError::Timeout(
                        "Read timeout exceeded while waiting for terminator".to_string(),
                    ));
                }
                if !self.wait_ready(fd, libc::POLLIN, Some(timeout.saturating_sub(elapsed)))? {
                    return Err(SerialError::Timeout(
                        "Read timeout exceeded while waiting for data".to_string(),
                    ));
                }
            }

            match self.sys.read(fd, &mut byte) {
                Ok(0) => {
                    return Err(SerialError::Io(
                        "Connection closed while reading: no terminator found".to_string(),
                    ));
                }
                Ok(_) => {
                    buffer.push(byte[0]);
                    if byte[0] == terminator {
                        break;
                    }
                }
                Err(Errno::EAGAIN) => std::thread::sleep(WOULD_BLOCK_BACKOFF),
                Err(e) => return Err(SerialError::Io(os_message("Error reading from serial port", e))),
            }
        }

        log::trace!("Read {} bytes until {:#04x}", buffer.len(), terminator);
        Ok(buffer.len())
    }

    /// [`read_until`](Self::read_until) with the session's terminator.
    pub fn read_until_terminator(&mut self, buffer: &mut Vec<u8>) -> Result<usize> {
        let terminator = self.terminator.as_byte();
        self.read_until(buffer, terminator)
    }

    /// Discard everything received but not yet read.
    pub fn flush_input_buffer(&mut self) -> Result<()> {
        let fd = self.raw_fd()?;
        self.sys
            .flush_input(fd)
            .map_err(|e| SerialError::Io(os_message("Error flushing input buffer", e)))
    }

    /// Bytes waiting in the input queue.
    pub fn available_bytes(&self) -> Result<usize> {
        let fd = self.raw_fd()?;
        self.sys
            .bytes_available(fd)
            .map_err(|e| SerialError::Io(os_message("Error getting available data", e)))
    }

    /// Poll `fd` for `events`. `Ok(false)` means the wait expired.
    fn wait_ready(&self, fd: RawFd, events: libc::c_short, timeout: Option<Duration>) -> Result<bool> {
        match self.sys.poll(fd, events, poll_timeout_ms(timeout)) {
            Ok(ready) => Ok(ready > 0),
            Err(Errno::EINTR) => Err(SerialError::Interrupted(os_message("Error in poll()", Errno::EINTR))),
            Err(e) => Err(SerialError::Io(os_message("Error in poll()", e))),
        }
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Serial {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("{}", e);
        }
    }
}

/// `None` maps to poll's infinite wait. Partial milliseconds round up so a
/// short remaining budget is not turned into a non-blocking poll.
fn poll_timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(t) => {
            let ms = t.as_micros().div_ceil(1000);
            ms.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn open_error(port: &str, err: &io::Error) -> SerialError {
    let message = format!("Error opening port {}: {}", port, io_reason(err));
    match err.kind() {
        io::ErrorKind::NotFound => SerialError::PortNotFound(message),
        io::ErrorKind::PermissionDenied => SerialError::PermissionDenied(message),
        _ => SerialError::Io(message),
    }
}
