use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serialport::SerialPortType;

use super::{Device, DeviceError, Result};
use crate::serial::io_reason;

pub const DEFAULT_BY_ID_DIR: &str = "/dev/serial/by-id";

/// Serial device discovery.
///
/// Each instance keeps its own device list, rebuilt from scratch on every
/// scan.
#[derive(Debug, Clone)]
pub struct Ports {
    by_id_dir: PathBuf,
    devices: Vec<Device>,
}

impl Ports {
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_BY_ID_DIR)
    }

    /// Scan `by_id_dir` instead of `/dev/serial/by-id`. Bus paths are looked
    /// up in the sibling `by-path` directory.
    pub fn with_dir(by_id_dir: impl Into<PathBuf>) -> Self {
        Self {
            by_id_dir: by_id_dir.into(),
            devices: Vec::new(),
        }
    }

    /// Rebuild the device list from the `by-id` symlinks. Returns the
    /// number of devices found.
    pub fn scan_ports(&mut self) -> Result<usize> {
        let entries = fs::read_dir(&self.by_id_dir).map_err(|e| {
            DeviceError::Scan(format!("Error while reading {}: {}", self.by_id_dir.display(), io_reason(&e)))
        })?;

        let bus_paths = self.bus_paths();
        let mut found: Vec<(String, String)> = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(port_path) = resolve_device_node(&entry.path()) else {
                log::debug!("Skipping {}: not a device link", entry.path().display());
                continue;
            };
            found.push((name, port_path));
        }

        found.sort();
        self.devices = found
            .into_iter()
            .enumerate()
            .map(|(id, (name, port_path))| {
                let bus_path = bus_paths.get(&port_path).cloned().unwrap_or_else(|| port_path.clone());
                Device::new(name, port_path, bus_path, id as u16)
            })
            .collect();

        log::info!("Found {} serial device(s) in {}", self.devices.len(), self.by_id_dir.display());
        Ok(self.devices.len())
    }

    /// Rebuild the device list from the system serial port enumeration,
    /// which also covers ports without a `by-id` link.
    pub fn scan_system_ports(&mut self) -> Result<usize> {
        let ports = serialport::available_ports()?;

        self.devices = ports
            .into_iter()
            .enumerate()
            .map(|(id, port)| {
                let name = Path::new(&port.port_name)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| port.port_name.clone());
                let bus_path = match &port.port_type {
                    SerialPortType::UsbPort(usb) => format!("usb-{:04x}:{:04x}", usb.vid, usb.pid),
                    SerialPortType::PciPort => "pci".to_string(),
                    SerialPortType::BluetoothPort => "bluetooth".to_string(),
                    SerialPortType::Unknown => port.port_name.clone(),
                };
                Device::new(name, port.port_name, bus_path, id as u16)
            })
            .collect();

        Ok(self.devices.len())
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Copy the current device list into `out`, replacing its contents.
    pub fn get_devices(&self, out: &mut Vec<Device>) {
        out.clear();
        out.extend(self.devices.iter().cloned());
    }

    pub fn find_device(&self, id: u16) -> Option<&Device> {
        self.devices.iter().find(|d| d.id() == id)
    }

    pub fn find_name(&self, id: u16) -> Option<String> {
        self.find_device(id).map(|d| d.name().to_string())
    }

    pub fn find_port_path(&self, id: u16) -> Option<String> {
        self.find_device(id).map(|d| d.port_path().to_string())
    }

    pub fn find_bus_path(&self, id: u16) -> Option<String> {
        self.find_device(id).map(|d| d.bus_path().to_string())
    }

    /// Maps device node to `by-path` link. Missing directory means no entries.
    fn bus_paths(&self) -> HashMap<String, String> {
        let Some(by_path_dir) = self.by_id_dir.parent().map(|p| p.join("by-path")) else {
            return HashMap::new();
        };
        let Ok(entries) = fs::read_dir(&by_path_dir) else {
            return HashMap::new();
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let link = entry.path();
                resolve_device_node(&link).map(|node| (node, link.to_string_lossy().into_owned()))
            })
            .collect()
    }
}

impl Default for Ports {
    fn default() -> Self {
        Self::new()
    }
}

/// `../../ttyUSB0` → `/dev/ttyUSB0`. The target itself need not exist.
fn resolve_device_node(link: &Path) -> Option<String> {
    let target = fs::read_link(link).ok()?;
    let node = target.file_name()?;
    Some(Path::new("/dev").join(node).to_string_lossy().into_owned())
}
