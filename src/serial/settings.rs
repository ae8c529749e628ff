use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::interface::{duration_ms, DEFAULT_MAX_SAFE_READ_SIZE, DEFAULT_TIMEOUT};
use super::types::{CanonicalMode, DataLength, FlowControl, Parity, StopBits, Terminator};

/// Serializable line configuration for a port.
///
/// Timeouts are in milliseconds; a missing (`null`) timeout blocks forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    pub baud_rate: u32,
    pub data_length: DataLength,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub canonical_mode: CanonicalMode,
    pub terminator: Terminator,
    pub read_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub min_chars: u8,
    pub inter_byte_timeout_ms: u64,
    pub max_safe_read_size: usize,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_length: DataLength::Eight,
            parity: Parity::Disabled,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            canonical_mode: CanonicalMode::Enabled,
            terminator: Terminator::Lf,
            read_timeout_ms: Some(duration_ms(DEFAULT_TIMEOUT)),
            write_timeout_ms: Some(duration_ms(DEFAULT_TIMEOUT)),
            min_chars: 0,
            inter_byte_timeout_ms: 0,
            max_safe_read_size: DEFAULT_MAX_SAFE_READ_SIZE,
        }
    }
}

impl PortSettings {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents).map_err(std::io::Error::from)
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}
