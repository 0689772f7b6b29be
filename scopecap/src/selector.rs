//! Transport candidates
//!
//! The order in which a capture tries to reach an instrument, and the
//! resource lookups that feed it.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use scopecap_core::constants::{usb_patterns, VICP_PORT};
use scopecap_core::resource;
use scopecap_transport::{Instrument, InstrumentBackend};

/// One way of reaching the instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Native VICP on a TCP port
    Vicp { host: String, port: u16 },
    /// Generic-driver resource string
    Resource(String),
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vicp { host, port } => write!(f, "VICP {}:{}", host, port),
            Self::Resource(resource) => f.write_str(resource),
        }
    }
}

/// LAN candidates: native VICP first, then VXI-11, HiSLIP and raw SCPI
///
/// # Examples
///
/// ```
/// use scopecap::selector::{ethernet_candidates, Candidate};
///
/// let candidates = ethernet_candidates("192.168.1.50", 0);
/// assert_eq!(candidates[0], Candidate::Vicp { host: "192.168.1.50".into(), port: 1861 });
/// assert_eq!(candidates.len(), 4);
/// ```
pub fn ethernet_candidates(host: &str, port: u16) -> Vec<Candidate> {
    let mut candidates = vec![Candidate::Vicp {
        host: host.to_string(),
        port: VICP_PORT,
    }];
    candidates.extend(
        resource::ethernet_resources(host, port)
            .into_iter()
            .map(Candidate::Resource),
    );
    candidates
}

/// USB candidates for a known resource string
pub fn usb_candidates(resource: &str) -> Vec<Candidate> {
    vec![Candidate::Resource(resource.to_string())]
}

/// USB instruments the backend can see
///
/// Search patterns are tried in priority order; the first one that finds
/// anything wins. Duplicates are dropped.
pub async fn list_usb_resources(backend: &dyn InstrumentBackend) -> Vec<String> {
    for pattern in usb_patterns::ALL {
        let found = match backend.list(pattern).await {
            Ok(found) => found,
            Err(e) => {
                debug!("USB search '{}' failed: {}", pattern, e);
                continue;
            }
        };

        let mut unique: Vec<String> = Vec::with_capacity(found.len());
        for resource in found {
            if !unique.contains(&resource) {
                unique.push(resource);
            }
        }

        if !unique.is_empty() {
            info!("USB search '{}' found {} device(s)", pattern, unique.len());
            return unique;
        }
        debug!("USB search '{}' found nothing", pattern);
    }

    Vec::new()
}

/// First USB instrument the backend can see
pub async fn find_usb_resource(backend: &dyn InstrumentBackend) -> Option<String> {
    let resources = list_usb_resources(backend).await;
    for (i, resource) in resources.iter().enumerate() {
        info!("  [{}] {}", i, resource);
    }

    let first = resources.into_iter().next();
    if first.is_none() {
        warn!("No USB instrument found via {} backend", backend.name());
    }
    first
}

/// Open `resource`, retrying with the `::INSTR`/`::INST` twin on failure
///
/// Returns the error of the last variant tried.
pub async fn open_with_suffix_repair(
    backend: &dyn InstrumentBackend,
    resource: &str,
    timeout: Duration,
) -> scopecap_transport::Result<Box<dyn Instrument>> {
    let variants = resource::suffix_variants(resource);
    let mut last_error = None;

    for variant in &variants {
        match backend.open(variant, timeout).await {
            Ok(instrument) => {
                if variant != resource {
                    info!("Opened {} with adjusted suffix", variant);
                }
                return Ok(instrument);
            }
            Err(e) => {
                debug!("Open {} failed: {}", variant, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(scopecap_transport::Error::NotConnected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    /// Backend that knows a fixed set of resources
    #[derive(Default)]
    struct FakeBackend {
        listings: Vec<(&'static str, Vec<String>)>,
        openable: Vec<String>,
        opened: Mutex<Vec<String>>,
    }

    struct NullInstrument(String);

    #[async_trait]
    impl Instrument for NullInstrument {
        fn resource(&self) -> &str {
            &self.0
        }

        async fn write(&mut self, _command: &str) -> scopecap_transport::Result<()> {
            Ok(())
        }

        async fn read_line(&mut self) -> scopecap_transport::Result<String> {
            Ok(String::new())
        }

        async fn read_raw(&mut self) -> scopecap_transport::Result<Bytes> {
            Ok(Bytes::new())
        }

        async fn close(&mut self) -> scopecap_transport::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl InstrumentBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn open(
            &self,
            resource: &str,
            _timeout: Duration,
        ) -> scopecap_transport::Result<Box<dyn Instrument>> {
            self.opened.lock().push(resource.to_string());
            if self.openable.iter().any(|r| r == resource) {
                Ok(Box::new(NullInstrument(resource.to_string())))
            } else {
                Err(scopecap_transport::Error::Visa(format!("VI_ERROR_RSRC_NFOUND: {}", resource)))
            }
        }

        async fn list(&self, pattern: &str) -> scopecap_transport::Result<Vec<String>> {
            Ok(self
                .listings
                .iter()
                .find(|(p, _)| *p == pattern)
                .map(|(_, found)| found.clone())
                .unwrap_or_default())
        }
    }

    #[test]
    fn test_ethernet_order() {
        assert_eq!(
            ethernet_candidates("10.0.0.5", 5025),
            vec![
                Candidate::Vicp {
                    host: "10.0.0.5".into(),
                    port: 1861
                },
                Candidate::Resource("TCPIP::10.0.0.5::inst0::INSTR".into()),
                Candidate::Resource("TCPIP::10.0.0.5::hislip0::INSTR".into()),
                Candidate::Resource("TCPIP::10.0.0.5::5025::SOCKET".into()),
            ]
        );
    }

    #[test]
    fn test_candidate_display() {
        let vicp = Candidate::Vicp {
            host: "10.0.0.5".into(),
            port: 1861,
        };
        assert_eq!(vicp.to_string(), "VICP 10.0.0.5:1861");
        assert_eq!(usb_candidates("USB0::1::2::3::INSTR")[0].to_string(), "USB0::1::2::3::INSTR");
    }

    #[tokio::test]
    async fn test_usb_first_productive_pattern_wins() {
        let backend = FakeBackend {
            listings: vec![
                ("USB?*::INSTR", vec![]),
                (
                    "USB?*::INST",
                    vec![
                        "USB0::0x05FF::0x1023::LCRY4903C21017::INST".into(),
                        "USB0::0x05FF::0x1023::LCRY4903C21017::INST".into(),
                        "USB0::0x05FF::0x1023::LCRY0000000001::INST".into(),
                    ],
                ),
                ("USB?*", vec!["USB0::0x1AB1::0x04CE::DS1ZA1::INSTR".into()]),
            ],
            ..Default::default()
        };

        assert_eq!(
            find_usb_resource(&backend).await.as_deref(),
            Some("USB0::0x05FF::0x1023::LCRY4903C21017::INST")
        );
    }

    #[tokio::test]
    async fn test_usb_listing_dedupes() {
        let backend = FakeBackend {
            listings: vec![(
                "USB?*::INSTR",
                vec![
                    "USB0::0x0699::0x0522::C012345::INSTR".into(),
                    "USB0::0x0699::0x0522::C012345::INSTR".into(),
                    "USB0::0x1AB1::0x04CE::DS1ZA1::INSTR".into(),
                ],
            )],
            ..Default::default()
        };

        assert_eq!(
            list_usb_resources(&backend).await,
            vec![
                "USB0::0x0699::0x0522::C012345::INSTR",
                "USB0::0x1AB1::0x04CE::DS1ZA1::INSTR",
            ]
        );
    }

    #[tokio::test]
    async fn test_usb_nothing_found() {
        let backend = FakeBackend::default();
        assert_eq!(find_usb_resource(&backend).await, None);
    }

    #[tokio::test]
    async fn test_suffix_repair_falls_back_to_inst() {
        let backend = FakeBackend {
            openable: vec!["USB0::0x05FF::0x1023::LCRY4903C21017::INST".into()],
            ..Default::default()
        };

        let instrument = open_with_suffix_repair(
            &backend,
            "USB0::0x05FF::0x1023::LCRY4903C21017::INSTR",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(instrument.resource(), "USB0::0x05FF::0x1023::LCRY4903C21017::INST");
        assert_eq!(
            *backend.opened.lock(),
            vec![
                "USB0::0x05FF::0x1023::LCRY4903C21017::INSTR",
                "USB0::0x05FF::0x1023::LCRY4903C21017::INST",
            ]
        );
    }

    #[tokio::test]
    async fn test_suffix_repair_reports_last_error() {
        let backend = FakeBackend::default();

        let result = open_with_suffix_repair(&backend, "USB0::1::2::3::INSTR", Duration::from_secs(1)).await;
        match result {
            Err(scopecap_transport::Error::Visa(msg)) => assert!(msg.ends_with("USB0::1::2::3::INST")),
            _ => panic!("expected a VISA error"),
        }
    }
}
