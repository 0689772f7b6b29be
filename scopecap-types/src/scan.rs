//! Instrument discovery results

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

/// Bus an instrument was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanKind {
    Ethernet,
    Usb,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ethernet => f.write_str("ETHERNET"),
            Self::Usb => f.write_str("USB"),
        }
    }
}

/// One instrument that answered `*IDN?`
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEntry {
    #[serde(rename = "type")]
    pub kind: ScanKind,

    /// IP address or VISA resource
    pub address: String,

    /// TCP port, or `USB-TMC`
    pub port: String,

    pub vendor: String,

    pub idn: String,

    /// Resource string to hand to the capture tool
    pub resource: String,
}

impl ScanEntry {
    pub fn ethernet(ip: impl Into<String>, port: u16, vendor: impl Into<String>, idn: impl Into<String>) -> Self {
        let ip = ip.into();
        Self {
            kind: ScanKind::Ethernet,
            resource: format!("TCPIP::{}::inst0::INSTR", ip),
            address: ip,
            port: port.to_string(),
            vendor: vendor.into(),
            idn: idn.into(),
        }
    }

    pub fn usb(resource: impl Into<String>, vendor: impl Into<String>, idn: impl Into<String>) -> Self {
        let resource = resource.into();
        Self {
            kind: ScanKind::Usb,
            address: resource.clone(),
            port: "USB-TMC".to_string(),
            vendor: vendor.into(),
            idn: idn.into(),
            resource,
        }
    }
}

/// Everything found by one scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub started_at: DateTime<Local>,
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
