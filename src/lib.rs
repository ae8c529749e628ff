//! Blocking serial port sessions for POSIX hosts.
//!
//! [`serial::Serial`] owns one port: it maps line settings onto the kernel's
//! termios2 record and provides poll-bounded, mode-aware reads and writes.
//! [`device::Ports`] discovers candidate device paths.
pub mod device;
pub mod logging;
pub mod serial;

pub use device::{Device, DeviceError, Ports};
pub use serial::{
    BaudRate, CanonicalMode, DataLength, ErrorKind, FlowControl, Parity, PortSettings, Serial, SerialError,
    StopBits, Terminator,
};
