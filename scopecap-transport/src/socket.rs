//! Raw SCPI over a TCP socket (`TCPIP::<host>::<port>::SOCKET`)
//!
//! Commands go out with a `\n` terminator. Text replies end at `\n`. Binary
//! replies have no terminator: they end when an announced IEEE block is
//! complete, when the instrument goes quiet for `idle_timeout` after the
//! first byte, or when it closes the socket.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use scopecap_core::block::block_len;
use scopecap_core::resource;

use crate::instrument::{Instrument, InstrumentBackend};
use crate::{error::*, TcpTransport, Transport};

/// Default quiet period that ends an unframed binary reply
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// SCPI session over any byte [`Transport`]
pub struct SocketInstrument {
    resource: String,
    transport: Box<dyn Transport>,
    buf: BytesMut,
    timeout: Duration,
    idle_timeout: Duration,
}

impl SocketInstrument {
    /// Wrap an already connected transport
    pub fn new(resource: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            resource: resource.into(),
            transport,
            buf: BytesMut::new(),
            timeout: Duration::from_secs(scopecap_core::constants::DEFAULT_TIMEOUT),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Set the wait for the first byte of a reply
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    async fn fill(&mut self, wait: Duration) -> Result<()> {
        let chunk = self.transport.receive(wait).await?;
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    /// Reply complete once an announced block has fully arrived
    fn complete_block(&mut self) -> Option<Bytes> {
        let total = block_len(&self.buf)?;
        if self.buf.len() < total {
            return None;
        }

        let block = self.buf.split_to(total).freeze();
        if self.buf.first() == Some(&b'\n') {
            let _ = self.buf.split_to(1);
        }
        Some(block)
    }
}

#[async_trait]
impl Instrument for SocketInstrument {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn write(&mut self, command: &str) -> Result<()> {
        debug!("SCPI write [{}]: {}", self.resource, command);

        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');
        self.transport.send(&line).await
    }

    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                return Ok(String::from_utf8_lossy(&line[..pos]).into_owned());
            }

            match self.fill(self.timeout).await {
                Ok(()) => {}
                Err(e) if e.ends_stream() && !self.buf.is_empty() => {
                    let line = self.buf.split();
                    return Ok(String::from_utf8_lossy(&line).into_owned());
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn read_raw(&mut self) -> Result<Bytes> {
        loop {
            if let Some(block) = self.complete_block() {
                trace!("SCPI block reply: {} bytes", block.len());
                return Ok(block);
            }

            // A pending block header tells us more is coming; otherwise a
            // quiet gap after the first byte ends the reply
            let wait = if self.buf.is_empty() || block_len(&self.buf).is_some() {
                self.timeout
            } else {
                self.idle_timeout
            };

            match self.fill(wait).await {
                Ok(()) => {}
                Err(e) if e.ends_stream() && !self.buf.is_empty() => {
                    debug!("SCPI raw reply ended ({}) at {} bytes", e, self.buf.len());
                    return Ok(self.buf.split().freeze());
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.buf.clear();
        self.transport.disconnect().await
    }
}

/// Backend that only understands `TCPIP::<host>::<port>::SOCKET`
///
/// It cannot enumerate USB devices or speak VXI-11/HiSLIP; those resources
/// report `UnsupportedResource` so the caller moves on to the next one.
#[derive(Debug, Clone)]
pub struct SocketBackend {
    idle_timeout: Duration,
}

impl SocketBackend {
    pub fn new() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

impl Default for SocketBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstrumentBackend for SocketBackend {
    fn name(&self) -> &'static str {
        "socket"
    }

    async fn open(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Instrument>> {
        let (host, port) =
            resource::parse_socket(resource).map_err(|_| Error::UnsupportedResource {
                backend: self.name(),
                resource: resource.to_string(),
            })?;

        let mut transport = TcpTransport::new(host, port).with_connect_timeout(timeout);
        transport.connect().await?;

        let instrument = SocketInstrument::new(resource, Box::new(transport))
            .with_timeout(timeout)
            .with_idle_timeout(self.idle_timeout);
        Ok(Box::new(instrument))
    }

    async fn list(&self, pattern: &str) -> Result<Vec<String>> {
        debug!("Socket backend cannot enumerate '{}'", pattern);
        Ok(Vec::new())
    }
}
