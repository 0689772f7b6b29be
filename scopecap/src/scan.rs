//! Instrument discovery
//!
//! Sweeps one or more IPv4 subnets for hosts that answer `*IDN?` on an
//! instrument port, and asks the instrument backend for USB devices. Both
//! sweeps run at the same time.

use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use if_addrs::IfAddr;
use ipnet::Ipv4Net;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use scopecap_core::constants::{HTTP_PORT, IDN_QUERY, VICP_IDN_DELAY, VICP_PORT};
use scopecap_core::Vendor;
use scopecap_transport::{
    tcp, Instrument, InstrumentBackend, SocketInstrument, TcpTransport, Transport, VicpClient,
};
use scopecap_types::{ScanEntry, ScanReport};

use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::{net, selector};

/// CSV header, in column order
pub const COLUMNS: [&str; 6] = ["type", "address", "port", "vendor", "idn", "resource"];

const TABLE_HEADINGS: [&str; 6] = ["TYPE", "ADDRESS", "PORT", "VENDOR", "IDN", "VISA RESOURCE"];
const TABLE_WIDTHS: [usize; 6] = [9, 17, 8, 22, 52, 42];
const TABLE_RULE: usize = 120;

/// Address used only to pick the default route
const ROUTE_PROBE: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// One IPv4 address of a local network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub name: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub up: bool,
}

/// IPv4 addresses of every local interface
pub fn local_interfaces() -> Vec<InterfaceAddr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("Cannot enumerate network interfaces: {}", e);
            return Vec::new();
        }
    };

    interfaces
        .into_iter()
        .filter_map(|iface| {
            let up = iface.is_oper_up();
            match iface.addr {
                IfAddr::V4(v4) => Some(InterfaceAddr {
                    name: iface.name,
                    ip: v4.ip,
                    netmask: v4.netmask,
                    up,
                }),
                IfAddr::V6(_) => None,
            }
        })
        .collect()
}

/// Subnet of each active, non-loopback interface, labelled by interface
///
/// Each subnet appears once, under the first interface that has it. A
/// netmask that is not a valid prefix falls back to /24.
pub fn interface_subnets(interfaces: &[InterfaceAddr]) -> Vec<(String, Ipv4Net)> {
    let mut subnets: Vec<(String, Ipv4Net)> = Vec::new();

    for iface in interfaces {
        if !iface.up || iface.ip.is_loopback() || iface.ip.is_unspecified() {
            continue;
        }

        let subnet = Ipv4Net::with_netmask(iface.ip, iface.netmask)
            .map(|net| net.trunc())
            .unwrap_or_else(|_| net::local_subnet(iface.ip));

        if subnets.iter().any(|(_, known)| *known == subnet) {
            continue;
        }
        subnets.push((iface.name.clone(), subnet));
    }

    subnets
}

/// Checks one host for an instrument
#[derive(Debug, Clone)]
pub struct HostProbe {
    pub ports: Vec<u16>,
    pub tcp_timeout: Duration,
    pub idn_timeout: Duration,
}

impl HostProbe {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            ports: config.ports.clone(),
            tcp_timeout: config.tcp_timeout(),
            idn_timeout: config.idn_timeout(),
        }
    }

    /// First port on `ip` that is open and answers `*IDN?`
    pub async fn scan_host(&self, ip: Ipv4Addr) -> Option<ScanEntry> {
        let host = ip.to_string();

        for &port in &self.ports {
            if !tcp::probe(&host, port, self.tcp_timeout).await {
                continue;
            }

            // a web server alone does not make an instrument
            if port == HTTP_PORT {
                debug!("{}:{} open, no SCPI on this port", host, port);
                continue;
            }

            let idn = match self.query_idn(&host, port).await {
                Ok(idn) if !idn.is_empty() => idn,
                Ok(_) => {
                    debug!("{}:{} open, empty identity", host, port);
                    continue;
                }
                Err(e) => {
                    debug!("{}:{} open, no identity: {}", host, port, e);
                    continue;
                }
            };

            let vendor = Vendor::detect(&idn);
            return Some(ScanEntry::ethernet(host, port, vendor.display_name(), idn));
        }

        None
    }

    /// `*IDN?` over VICP on the VICP port, raw SCPI elsewhere
    pub async fn query_idn(&self, host: &str, port: u16) -> scopecap_transport::Result<String> {
        let transport = Box::new(TcpTransport::new(host, port).with_connect_timeout(self.idn_timeout));

        if port == VICP_PORT {
            let mut client = VicpClient::new(transport).with_read_timeout(self.idn_timeout);
            client.connect().await?;
            let idn = client.query(IDN_QUERY, VICP_IDN_DELAY).await;
            let _ = client.disconnect().await;
            return idn;
        }

        let mut transport = transport;
        transport.connect().await?;
        let resource = format!("TCPIP::{}::{}::SOCKET", host, port);
        let mut instrument = SocketInstrument::new(resource, transport).with_timeout(self.idn_timeout);
        let idn = instrument.query(IDN_QUERY).await;
        let _ = instrument.close().await;
        idn
    }
}

pub struct Scanner {
    config: ScanConfig,
    backend: Arc<dyn InstrumentBackend>,
}

impl Scanner {
    pub fn new(config: ScanConfig, backend: Arc<dyn InstrumentBackend>) -> Self {
        Self { config, backend }
    }

    /// Run the configured sweeps
    pub async fn run(&self) -> Result<ScanReport> {
        if !self.config.ethernet && !self.config.usb {
            return Err(scopecap_types::Error::Validation(
                "both ethernet and usb scanning are disabled".into(),
            )
            .into());
        }

        let mut report = ScanReport::new(Local::now());
        let (ethernet, usb) = tokio::join!(self.scan_ethernet(), self.scan_usb());

        report.entries.extend(ethernet?);
        report.entries.extend(usb);
        info!("Scan complete: {} instrument(s) found", report.len());
        Ok(report)
    }

    /// Subnets to sweep, labelled for the log
    pub async fn subnets(&self) -> Result<Vec<(String, Ipv4Net)>> {
        if !self.config.subnets.is_empty() {
            return self
                .config
                .subnets
                .iter()
                .map(|cidr| {
                    cidr.trim()
                        .parse::<Ipv4Net>()
                        .map(|net| ("(manual)".to_string(), net.trunc()))
                        .map_err(|_| Error::InvalidAddress(format!("'{}' is not an IPv4 subnet", cidr)))
                })
                .collect();
        }

        let subnets = interface_subnets(&local_interfaces());
        if !subnets.is_empty() {
            return Ok(subnets);
        }

        debug!("No active interface found, using the default route");
        match net::local_ip_for(IpAddr::V4(ROUTE_PROBE)).await {
            Some(IpAddr::V4(local)) => Ok(vec![(local.to_string(), net::local_subnet(local))]),
            _ => Err(Error::InvalidAddress(
                "cannot detect a local subnet; set scan.subnets, e.g. [\"192.168.1.0/24\"]".into(),
            )),
        }
    }

    async fn scan_ethernet(&self) -> Result<Vec<ScanEntry>> {
        if !self.config.ethernet {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (label, subnet) in self.subnets().await? {
            info!("Scanning {} via {}", subnet, label);
            for entry in self.scan_subnet(subnet).await {
                if seen.insert(entry.address.clone()) {
                    entries.push(entry);
                }
            }
        }

        Ok(entries)
    }

    /// Probe every host of `subnet`, at most `max_workers` at a time
    pub async fn scan_subnet(&self, subnet: Ipv4Net) -> Vec<ScanEntry> {
        let hosts: Vec<Ipv4Addr> = subnet.hosts().collect();
        let total = hosts.len();
        info!("{}: {} hosts, {} workers", subnet, total, self.config.max_workers);

        let probe = Arc::new(HostProbe::from_config(&self.config));
        let permits = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let found = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = JoinSet::new();

        for ip in hosts {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let probe = Arc::clone(&probe);
            let found = Arc::clone(&found);

            tasks.spawn(async move {
                let _permit = permit;
                if let Some(entry) = probe.scan_host(ip).await {
                    info!("Found {}:{}  {}  {}", entry.address, entry.port, entry.vendor, entry.idn);
                    found.lock().push(entry);
                }
            });
        }

        let mut done = 0;
        while let Some(joined) = tasks.join_next().await {
            done += 1;
            if let Err(e) = joined {
                warn!("Host probe task failed: {}", e);
            }
            if done % 64 == 0 || done == total {
                debug!("{}: {}/{} hosts probed", subnet, done, total);
            }
        }

        let mut entries = std::mem::take(&mut *found.lock());
        entries.sort_by_key(|entry| entry.address.parse::<Ipv4Addr>().ok());
        entries
    }

    /// Identify every USB instrument the backend can enumerate
    pub async fn scan_usb(&self) -> Vec<ScanEntry> {
        if !self.config.usb {
            return Vec::new();
        }

        info!("USB scan via {} backend", self.backend.name());
        let resources = selector::list_usb_resources(self.backend.as_ref()).await;
        if resources.is_empty() {
            info!("No USB-TMC devices detected");
            return Vec::new();
        }

        let mut entries = Vec::new();
        for resource in resources {
            let idn = match self.usb_idn(&resource).await {
                Ok(idn) if !idn.is_empty() => idn,
                Ok(_) => {
                    info!("{}: no identity, skipped", resource);
                    continue;
                }
                Err(e) => {
                    warn!("{}: open/identify failed: {}", resource, e);
                    continue;
                }
            };

            let vendor = Vendor::detect(&idn);
            info!("Found USB  {}  {}", vendor.display_name(), idn);
            entries.push(ScanEntry::usb(resource, vendor.display_name(), idn));
        }

        entries
    }

    async fn usb_idn(&self, resource: &str) -> scopecap_transport::Result<String> {
        let mut instrument = self.backend.open(resource, self.config.idn_timeout()).await?;
        let idn = instrument.query(IDN_QUERY).await;
        let _ = instrument.close().await;
        idn
    }
}

/// Results as a fixed-width console table
pub fn format_table(entries: &[ScanEntry]) -> String {
    let mut out = String::new();
    let rule = "═".repeat(TABLE_RULE);

    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("  {:^116}\n", "SCAN RESULTS"));
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("  {}\n", row(&TABLE_HEADINGS)));

    let separator: Vec<String> = TABLE_WIDTHS.iter().map(|&w| "─".repeat(w)).collect();
    out.push_str(&format!("  {}\n", separator.join("  ")));

    for entry in entries {
        let kind = entry.kind.to_string();
        out.push_str(&format!(
            "  {}\n",
            row(&[
                kind.as_str(),
                &entry.address,
                &entry.port,
                &entry.vendor,
                &entry.idn,
                &entry.resource,
            ])
        ));
    }

    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("\n  Total found: {} instrument(s)\n", entries.len()));
    out
}

fn row(values: &[&str; 6]) -> String {
    values
        .iter()
        .zip(TABLE_WIDTHS)
        .map(|(value, width)| format!("{:<width$.width$}", value, width = width))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Write `entries` to `path` as CSV, creating parent directories
pub fn write_csv(entries: &[ScanEntry], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(COLUMNS)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;

    info!("CSV saved to {}", path.display());
    Ok(())
}
