pub mod attributes;
pub mod interface;
pub mod settings;
pub mod sys;
pub mod types;

pub use attributes::TerminalAttributes;
pub use interface::Serial;
pub use settings::PortSettings;
pub use sys::{PosixSys, SysCalls};
pub use types::*;

use nix::errno::Errno;

/// Taxonomy kind of a [`SerialError`], for callers that branch on the failure
/// class rather than the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PortNotFound,
    PermissionDenied,
    InvalidArgument,
    ConfigurationError,
    IoError,
    Timeout,
    BufferOverflow,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("{0}")]
    PortNotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Configuration(String),

    #[error("Serial port is not open")]
    NotOpen,

    #[error("{0}")]
    Io(String),

    /// The readiness wait was interrupted by a signal.
    #[error("{0}")]
    Interrupted(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    BufferOverflow(String),
}

impl SerialError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SerialError::PortNotFound(_) => ErrorKind::PortNotFound,
            SerialError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            SerialError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SerialError::Configuration(_) => ErrorKind::ConfigurationError,
            SerialError::NotOpen | SerialError::Io(_) | SerialError::Interrupted(_) => {
                ErrorKind::IoError
            }
            SerialError::Timeout(_) => ErrorKind::Timeout,
            SerialError::BufferOverflow(_) => ErrorKind::BufferOverflow,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

/// The OS description of `errno`, e.g. `"Input/output error"` for EIO.
pub(crate) fn strerror(errno: Errno) -> String {
    os_description(errno as i32)
}

fn os_description(code: i32) -> String {
    let text = std::io::Error::from_raw_os_error(code).to_string();
    let suffix = format!(" (os error {})", code);
    match text.strip_suffix(&suffix) {
        Some(description) => description.to_string(),
        None => text,
    }
}

/// Formats `"<context>: <os error string>"`.
pub(crate) fn os_message(context: &str, errno: Errno) -> String {
    format!("{}: {}", context, strerror(errno))
}

/// OS description for an I/O error, falling back to its Display form.
pub(crate) fn io_reason(err: &std::io::Error) -> String {
    err.raw_os_error()
        .map(os_description)
        .unwrap_or_else(|| err.to_string())
}

pub type Result<T> = std::result::Result<T, SerialError>;
