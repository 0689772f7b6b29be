//! # scopecap
//!
//! Oscilloscope screen capture over native VICP, VISA-style generic drivers
//! and raw SCPI sockets, plus LAN/USB instrument discovery.
//!
//! ## Features
//!
//! - Native LeCroy VICP framing with multi-frame image reassembly
//! - Vendor command profiles for LeCroy, Tektronix, Keysight, Rigol, Siglent
//! - Ordered transport fallback with a per-candidate failure trace
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use scopecap::selector::ethernet_candidates;
//! use scopecap::{CaptureConfig, Capturer};
//! use scopecap_transport::SocketBackend;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> scopecap::Result<()> {
//!     let capturer = Capturer::new(CaptureConfig::default(), Arc::new(SocketBackend::new()));
//!     let candidates = ethernet_candidates("192.168.1.50", 0);
//!
//!     let outcome = capturer.capture(&candidates, Path::new("scope.png")).await?;
//!     println!("{} via {}", outcome.saved.path.display(), outcome.transport);
//!
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod net;
pub mod output;
pub mod scan;
pub mod selector;
pub mod session;

// Re-exports
pub use capture::{CaptureOutcome, Capturer, Dialer, TcpDialer};
pub use config::{CaptureConfig, Config, ConnectionConfig, ScanConfig};
pub use error::{AttemptFailure, Error, Result};
pub use scan::Scanner;
pub use selector::Candidate;
pub use session::{CaptureSession, CaptureState, FailureStage};

// Re-export types
pub use scopecap_core::{Background, Vendor};
pub use scopecap_types::{ConnectionMode, InstrumentIdentity, ScanEntry, ScanReport};

/// Install the `tracing` subscriber used by the binaries
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
