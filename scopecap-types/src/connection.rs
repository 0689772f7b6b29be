//! Connection mode selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How the capture tool reaches the instrument
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// LAN: VICP first, then VXI-11, HiSLIP and raw SCPI
    #[default]
    Ethernet,
    /// USB-TMC through VISA
    Usb,
}

impl FromStr for ConnectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethernet" | "lan" | "tcpip" => Ok(Self::Ethernet),
            "usb" => Ok(Self::Usb),
            other => Err(Error::Parse(format!(
                "unknown connection mode '{}' (expected 'ethernet' or 'usb')",
                other
            ))),
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ethernet => f.write_str("ETHERNET"),
            Self::Usb => f.write_str("USB"),
        }
    }
}
