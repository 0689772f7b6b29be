//! Transport layer for oscilloscope capture
//!
//! Provides TCP byte transports, the VICP client built on top of them, and
//! the generic-driver [`Instrument`] abstraction (raw SCPI sockets, plus the
//! system VISA library when the `visa` feature is enabled).

pub mod blocking;
pub mod error;
pub mod instrument;
pub mod mock;
pub mod socket;
pub mod tcp;
pub mod vicp;
#[cfg(feature = "visa")]
pub mod visa;

pub use blocking::BlockingReader;
pub use error::{Error, Result};
pub use instrument::{Instrument, InstrumentBackend};
pub use mock::MockTransport;
pub use socket::{SocketBackend, SocketInstrument};
pub use tcp::TcpTransport;
pub use vicp::VicpClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Byte stream to an instrument port
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Write all of `data`
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Whatever bytes arrive next, waiting at most `wait` for the first
    async fn receive(&mut self, wait: Duration) -> Result<BytesMut>;

    /// `host:port` for logs
    fn remote_addr(&self) -> String;
}

/// Backend used when nothing else is configured
///
/// With the `visa` feature this is the system VISA library, falling back to
/// raw sockets when no VISA installation can be loaded.
pub fn default_backend(idle_timeout: Duration) -> Arc<dyn InstrumentBackend> {
    #[cfg(feature = "visa")]
    {
        match visa::VisaBackend::new() {
            Ok(backend) => return Arc::new(backend),
            Err(e) => tracing::warn!("System VISA unavailable ({}), using raw sockets", e),
        }
    }

    Arc::new(SocketBackend::new().with_idle_timeout(idle_timeout))
}
