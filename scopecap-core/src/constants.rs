//! Protocol constants

use std::time::Duration;

/// Native VICP port
pub const VICP_PORT: u16 = 1861;

/// Raw SCPI socket port
pub const SCPI_PORT: u16 = 5025;

/// Instrument web server port (optional Basic Auth handshake)
pub const HTTP_PORT: u16 = 80;

/// Ports probed to decide whether a host is reachable at all
pub const REACHABILITY_PORTS: [u16; 3] = [VICP_PORT, SCPI_PORT, HTTP_PORT];

/// Default request timeout (seconds)
pub const DEFAULT_TIMEOUT: u64 = 15;

/// Replies shorter than this are acknowledgements, not images
pub const DEFAULT_MIN_IMAGE_BYTES: usize = 100;

/// A first binary read shorter than this sends the vendor's fallback trigger
pub const FALLBACK_TRIGGER_BYTES: usize = 10;

/// Identification query
pub const IDN_QUERY: &str = "*IDN?";

/// Settle and render delays between the steps of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    /// After the configuration commands, before the trigger
    pub settle: Duration,

    /// After the trigger, before reading the image
    pub render: Duration,
}

impl Delays {
    pub const fn from_millis(settle: u64, render: u64) -> Self {
        Self {
            settle: Duration::from_millis(settle),
            render: Duration::from_millis(render),
        }
    }
}

/// Delays on the native VICP path (full BMP render before the first frame)
pub const VICP_DELAYS: Delays = Delays::from_millis(500, 4000);

/// Pause between `*IDN?` and reading its reply over VICP
pub const VICP_IDN_DELAY: Duration = Duration::from_millis(200);

/// USB search expressions, in priority order
///
/// `::INST` is what the LeCroy IVI driver registers; `::INSTR` is standard VISA.
pub mod usb_patterns {
    pub const STANDARD: &str = "USB?*::INSTR";
    pub const VENDOR_DRIVER: &str = "USB?*::INST";
    pub const ANY: &str = "USB?*";

    pub const ALL: [&str; 3] = [STANDARD, VENDOR_DRIVER, ANY];
}
