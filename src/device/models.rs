use serde::{Deserialize, Serialize};

/// A serial device found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    name: String,
    port_path: String,
    bus_path: String,
    id: u16,
}

impl Device {
    pub fn new(name: impl Into<String>, port_path: impl Into<String>, bus_path: impl Into<String>, id: u16) -> Self {
        Self {
            name: name.into(),
            port_path: port_path.into(),
            bus_path: bus_path.into(),
            id,
        }
    }

    /// Stable name, e.g. the `/dev/serial/by-id` link name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device node to pass to [`Serial::open`](crate::serial::Serial::open).
    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    pub fn bus_path(&self) -> &str {
        &self.bus_path
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
