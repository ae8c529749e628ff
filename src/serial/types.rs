use serde::{Deserialize, Serialize};

/// Standard line speeds. Any other positive rate can still be passed to
/// [`Serial::set_baud_rate`](super::Serial::set_baud_rate) as a plain `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaudRate {
    B50,
    B75,
    B110,
    B134,
    B150,
    B200,
    B300,
    B600,
    B1200,
    B1800,
    B2400,
    B4800,
    B9600,
    B19200,
    B38400,
    B57600,
    B115200,
    B230400,
}

impl BaudRate {
    pub const ALL: [BaudRate; 18] = [
        BaudRate::B50,
        BaudRate::B75,
        BaudRate::B110,
        BaudRate::B134,
        BaudRate::B150,
        BaudRate::B200,
        BaudRate::B300,
        BaudRate::B600,
        BaudRate::B1200,
        BaudRate::B1800,
        BaudRate::B2400,
        BaudRate::B4800,
        BaudRate::B9600,
        BaudRate::B19200,
        BaudRate::B38400,
        BaudRate::B57600,
        BaudRate::B115200,
        BaudRate::B230400,
    ];

    pub fn as_u32(self) -> u32 {
        match self {
            BaudRate::B50 => 50,
            BaudRate::B75 => 75,
            BaudRate::B110 => 110,
            BaudRate::B134 => 134,
            BaudRate::B150 => 150,
            BaudRate::B200 => 200,
            BaudRate::B300 => 300,
            BaudRate::B600 => 600,
            BaudRate::B1200 => 1200,
            BaudRate::B1800 => 1800,
            BaudRate::B2400 => 2400,
            BaudRate::B4800 => 4800,
            BaudRate::B9600 => 9600,
            BaudRate::B19200 => 19200,
            BaudRate::B38400 => 38400,
            BaudRate::B57600 => 57600,
            BaudRate::B115200 => 115200,
            BaudRate::B230400 => 230400,
        }
    }

    pub fn from_u32(rate: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.as_u32() == rate)
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> u32 {
        rate.as_u32()
    }
}

/// Character size in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataLength {
    Five,
    Six,
    Seven,
    Eight,
}

impl DataLength {
    /// Widths outside 5..=8 fall back to eight bits.
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            5 => DataLength::Five,
            6 => DataLength::Six,
            7 => DataLength::Seven,
            _ => DataLength::Eight,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            DataLength::Five => 5,
            DataLength::Six => 6,
            DataLength::Seven => 7,
            DataLength::Eight => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    Hardware,
    Software,
}

/// Line discipline input mode. Decides whether [`Serial::read`](super::Serial::read)
/// or [`Serial::read_bytes`](super::Serial::read_bytes) is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalMode {
    Enabled,
    Disabled,
}

/// Message delimiter used by terminator-bounded reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    Eot,
    Cr,
    Lf,
    Byte(u8),
}

impl Terminator {
    pub fn as_byte(self) -> u8 {
        match self {
            Terminator::Eot => 0x04,
            Terminator::Cr => b'\r',
            Terminator::Lf => b'\n',
            Terminator::Byte(b) => b,
        }
    }
}

impl From<u8> for Terminator {
    fn from(byte: u8) -> Self {
        match byte {
            0x04 => Terminator::Eot,
            b'\r' => Terminator::Cr,
            b'\n' => Terminator::Lf,
            other => Terminator::Byte(other),
        }
    }
}
