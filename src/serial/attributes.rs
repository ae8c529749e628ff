//! Terminal attribute value object.
//!
//! A `TerminalAttributes` is a plain snapshot of the kernel's `termios2`
//! record. The session fetches a fresh one before every change, edits only
//! the fields it owns, and pushes it back; nothing here talks to the OS.
use std::fmt;
use std::time::Duration;

use super::types::{CanonicalMode, DataLength, FlowControl, Parity, StopBits};

#[derive(Clone, Copy)]
pub struct TerminalAttributes {
    raw: libc::termios2,
}

impl TerminalAttributes {
    pub fn from_raw(raw: libc::termios2) -> Self {
        Self { raw }
    }

    pub fn as_raw(&self) -> &libc::termios2 {
        &self.raw
    }

    pub fn as_raw_mut(&mut self) -> &mut libc::termios2 {
        &mut self.raw
    }

    /// Switches to an explicit integer speed: CBAUD cleared, BOTHER set,
    /// both directions use `rate`.
    pub fn set_baud_rate(&mut self, rate: u32) {
        self.raw.c_cflag &= !libc::CBAUD;
        self.raw.c_cflag |= libc::BOTHER;
        self.raw.c_ispeed = rate as libc::speed_t;
        self.raw.c_ospeed = rate as libc::speed_t;
    }

    pub fn input_speed(&self) -> u32 {
        self.raw.c_ispeed as u32
    }

    pub fn output_speed(&self) -> u32 {
        self.raw.c_ospeed as u32
    }

    pub fn set_data_length(&mut self, length: DataLength) {
        self.raw.c_cflag &= !libc::CSIZE;
        self.raw.c_cflag |= match length {
            DataLength::Five => libc::CS5,
            DataLength::Six => libc::CS6,
            DataLength::Seven => libc::CS7,
            DataLength::Eight => libc::CS8,
        };
    }

    pub fn data_length(&self) -> DataLength {
        match self.raw.c_cflag & libc::CSIZE {
            libc::CS5 => DataLength::Five,
            libc::CS6 => DataLength::Six,
            libc::CS7 => DataLength::Seven,
            _ => DataLength::Eight,
        }
    }

    pub fn set_parity(&mut self, parity: Parity) {
        match parity {
            Parity::Disabled => self.raw.c_cflag &= !libc::PARENB,
            Parity::Enabled => self.raw.c_cflag |= libc::PARENB,
        }
    }

    pub fn parity(&self) -> Parity {
        if self.raw.c_cflag & libc::PARENB != 0 {
            Parity::Enabled
        } else {
            Parity::Disabled
        }
    }

    pub fn set_stop_bits(&mut self, stop_bits: StopBits) {
        match stop_bits {
            StopBits::One => self.raw.c_cflag &= !libc::CSTOPB,
            StopBits::Two => self.raw.c_cflag |= libc::CSTOPB,
        }
    }

    pub fn stop_bits(&self) -> StopBits {
        if self.raw.c_cflag & libc::CSTOPB != 0 {
            StopBits::Two
        } else {
            StopBits::One
        }
    }

    pub fn set_flow_control(&mut self, flow_control: FlowControl) {
        let software = libc::IXON | libc::IXOFF | libc::IXANY;
        match flow_control {
            FlowControl::None => {
                self.raw.c_cflag &= !libc::CRTSCTS;
                self.raw.c_iflag &= !software;
            }
            FlowControl::Hardware => {
                self.raw.c_cflag |= libc::CRTSCTS;
                self.raw.c_iflag &= !software;
            }
            FlowControl::Software => {
                self.raw.c_cflag &= !libc::CRTSCTS;
                self.raw.c_iflag |= libc::IXON | libc::IXOFF;
            }
        }
    }

    pub fn flow_control(&self) -> FlowControl {
        if self.raw.c_cflag & libc::CRTSCTS != 0 {
            FlowControl::Hardware
        } else if self.raw.c_iflag & (libc::IXON | libc::IXOFF) != 0 {
            FlowControl::Software
        } else {
            FlowControl::None
        }
    }

    /// Enabling canonical input also makes `'\n'` the extra line delimiter.
    pub fn set_canonical_mode(&mut self, mode: CanonicalMode) {
        match mode {
            CanonicalMode::Enabled => {
                self.raw.c_lflag |= libc::ICANON;
                self.raw.c_cc[libc::VEOL] = b'\n';
            }
            CanonicalMode::Disabled => self.raw.c_lflag &= !libc::ICANON,
        }
    }

    pub fn canonical_mode(&self) -> CanonicalMode {
        if self.raw.c_lflag & libc::ICANON != 0 {
            CanonicalMode::Enabled
        } else {
            CanonicalMode::Disabled
        }
    }

    pub fn set_min_chars(&mut self, count: u8) {
        self.raw.c_cc[libc::VMIN] = count;
    }

    pub fn min_chars(&self) -> u8 {
        self.raw.c_cc[libc::VMIN]
    }

    /// VTIME is counted in tenths of a second and saturates at 25.5 s.
    pub fn set_inter_byte_timeout(&mut self, timeout: Duration) {
        let deciseconds = (timeout.as_millis() / 100).min(u8::MAX as u128) as u8;
        self.raw.c_cc[libc::VTIME] = deciseconds;
    }

    pub fn inter_byte_timeout(&self) -> Duration {
        Duration::from_millis(self.raw.c_cc[libc::VTIME] as u64 * 100)
    }
}

impl Default for TerminalAttributes {
    fn default() -> Self {
        // SAFETY: termios2 is a plain C struct of integers and byte arrays.
        Self::from_raw(unsafe { std::mem::zeroed() })
    }
}

impl fmt::Debug for TerminalAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalAttributes")
            .field("c_iflag", &format_args!("{:#o}", self.raw.c_iflag))
            .field("c_oflag", &format_args!("{:#o}", self.raw.c_oflag))
            .field("c_cflag", &format_args!("{:#o}", self.raw.c_cflag))
            .field("c_lflag", &format_args!("{:#o}", self.raw.c_lflag))
            .field("c_ispeed", &self.raw.c_ispeed)
            .field("c_ospeed", &self.raw.c_ospeed)
            .finish()
    }
}
