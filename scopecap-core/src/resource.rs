//! VISA resource strings
//!
//! Only the handful of forms the capture tool produces or accepts:
//!
//! ```text
//! TCPIP::<host>::inst0::INSTR       VXI-11
//! TCPIP::<host>::hislip0::INSTR     HiSLIP
//! TCPIP::<host>::<port>::SOCKET     raw SCPI socket
//! USB0::<vid>::<pid>::<serial>::INSTR
//! ```

use crate::constants::{SCPI_PORT, VICP_PORT};
use crate::error::{Error, Result};

const INSTR: &str = "::INSTR";
const INST: &str = "::INST";
const SOCKET: &str = "::SOCKET";

/// Generic-driver resources for a LAN instrument, in the order to try them
///
/// `port` is the configured port: 0 means auto (raw SCPI on 5025).
///
/// # Examples
///
/// ```
/// use scopecap_core::resource::ethernet_resources;
///
/// let resources = ethernet_resources("10.0.0.5", 0);
/// assert_eq!(resources[0], "TCPIP::10.0.0.5::inst0::INSTR");
/// assert_eq!(resources[2], "TCPIP::10.0.0.5::5025::SOCKET");
/// ```
pub fn ethernet_resources(host: &str, port: u16) -> Vec<String> {
    let socket_port = match port {
        0 | SCPI_PORT => SCPI_PORT,
        VICP_PORT => VICP_PORT,
        other => other,
    };

    vec![
        format!("TCPIP::{}::inst0::INSTR", host),
        format!("TCPIP::{}::hislip0::INSTR", host),
        format!("TCPIP::{}::{}::SOCKET", host, socket_port),
    ]
}

/// The resource itself plus its `::INSTR`/`::INST` twin
///
/// Some vendor drivers register a device under the other suffix.
pub fn suffix_variants(resource: &str) -> Vec<String> {
    let mut variants = vec![resource.to_string()];

    if let Some(stem) = resource.strip_suffix(INSTR) {
        variants.push(format!("{}{}", stem, INST));
    } else if let Some(stem) = resource.strip_suffix(INST) {
        variants.push(format!("{}{}", stem, INSTR));
    }

    variants
}

/// Host part of a `TCPIP::` resource
pub fn tcpip_host(resource: &str) -> Option<&str> {
    let mut parts = resource.split("::");
    let board = parts.next()?;
    if !board.to_ascii_uppercase().starts_with("TCPIP") {
        return None;
    }

    parts.next().filter(|host| !host.is_empty())
}

/// Whether a resource goes over the LAN
pub fn is_tcpip(resource: &str) -> bool {
    tcpip_host(resource).is_some()
}

/// Host and port of a `TCPIP::<host>::<port>::SOCKET` resource
pub fn parse_socket(resource: &str) -> Result<(String, u16)> {
    let invalid = || Error::InvalidResource(resource.to_string());

    let upper = resource.to_ascii_uppercase();
    if !upper.ends_with(SOCKET) {
        return Err(invalid());
    }

    let parts: Vec<&str> = resource.split("::").collect();
    let [board, host, port, _] = parts.as_slice() else {
        return Err(invalid());
    };

    if !board.to_ascii_uppercase().starts_with("TCPIP") || host.is_empty() {
        return Err(invalid());
    }

    let port = port.parse().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ethernet_resources_auto() {
        assert_eq!(
            ethernet_resources("192.168.1.50", 0),
            vec![
                "TCPIP::192.168.1.50::inst0::INSTR",
                "TCPIP::192.168.1.50::hislip0::INSTR",
                "TCPIP::192.168.1.50::5025::SOCKET",
            ]
        );
    }

    #[test]
    fn test_ethernet_resources_vicp_port() {
        let resources = ethernet_resources("192.168.1.50", 1861);
        assert_eq!(resources[2], "TCPIP::192.168.1.50::1861::SOCKET");
    }

    #[test]
    fn test_ethernet_resources_custom_port() {
        let resources = ethernet_resources("scope.lab", 4000);
        assert_eq!(resources[0], "TCPIP::scope.lab::inst0::INSTR");
        assert_eq!(resources[2], "TCPIP::scope.lab::4000::SOCKET");
    }

    #[test]
    fn test_suffix_variants_instr() {
        assert_eq!(
            suffix_variants("USB0::0x05FF::0x1023::LCRY4903C21017::INSTR"),
            vec![
                "USB0::0x05FF::0x1023::LCRY4903C21017::INSTR",
                "USB0::0x05FF::0x1023::LCRY4903C21017::INST",
            ]
        );
    }

    #[test]
    fn test_suffix_variants_inst() {
        assert_eq!(
            suffix_variants("USB0::0x05FF::0x1023::12345::INST"),
            vec![
                "USB0::0x05FF::0x1023::12345::INST",
                "USB0::0x05FF::0x1023::12345::INSTR",
            ]
        );
    }

    #[test]
    fn test_suffix_variants_other() {
        assert_eq!(
            suffix_variants("TCPIP::10.0.0.5::5025::SOCKET"),
            vec!["TCPIP::10.0.0.5::5025::SOCKET"]
        );
    }

    #[test]
    fn test_tcpip_host() {
        assert_eq!(tcpip_host("TCPIP::10.0.0.5::inst0::INSTR"), Some("10.0.0.5"));
        assert_eq!(tcpip_host("TCPIP0::10.0.0.5::hislip0::INSTR"), Some("10.0.0.5"));
        assert_eq!(tcpip_host("tcpip::scope.lab::5025::SOCKET"), Some("scope.lab"));
        assert_eq!(tcpip_host("USB0::0x05FF::0x1023::12345::INSTR"), None);
        assert!(!is_tcpip("GPIB0::7::INSTR"));
    }

    #[test]
    fn test_parse_socket() {
        assert_eq!(
            parse_socket("TCPIP::10.0.0.5::5025::SOCKET").unwrap(),
            ("10.0.0.5".to_string(), 5025)
        );
        assert!(parse_socket("TCPIP::10.0.0.5::inst0::INSTR").is_err());
        assert!(parse_socket("TCPIP::10.0.0.5::http::SOCKET").is_err());
        assert!(parse_socket("USB0::1::2::SOCKET").is_err());
    }
}
