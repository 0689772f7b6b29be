//! Scripted in-memory transport
//!
//! Replays a fixed sequence of reads and records everything sent. Used by
//! the tests of this crate and of the capture orchestrator.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::{error::*, Transport};

/// One scripted outcome of [`Transport::receive`]
#[derive(Debug, Clone)]
pub enum MockRead {
    Data(Bytes),
    Timeout,
    Closed,
}

/// In-memory [`Transport`] with a scripted read side
///
/// Once the script runs out every read reports `ConnectionClosed`.
#[derive(Debug, Clone)]
pub struct MockTransport {
    addr: String,
    connected: bool,
    refuse_connect: bool,
    reads: Arc<Mutex<VecDeque<MockRead>>>,
    sent: Arc<Mutex<Vec<Bytes>>>,
}

impl MockTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connected: false,
            refuse_connect: false,
            reads: Arc::default(),
            sent: Arc::default(),
        }
    }

    /// Make every `connect` fail as if the port were closed
    pub fn refusing(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Queue a chunk of incoming bytes
    pub fn push_read(&self, data: impl Into<Bytes>) {
        self.reads.lock().push_back(MockRead::Data(data.into()));
    }

    pub fn push_timeout(&self) {
        self.reads.lock().push_back(MockRead::Timeout);
    }

    pub fn push_close(&self) {
        self.reads.lock().push_back(MockRead::Closed);
    }

    /// Everything passed to `send`, one entry per call
    ///
    /// Shared between clones, so a test can keep a clone after handing the
    /// transport to a client.
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    /// Scripted reads not consumed yet
    pub fn pending_reads(&self) -> usize {
        self.reads.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.refuse_connect {
            return Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }
        if self.connected {
            return Err(Error::AlreadyConnected);
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.sent.lock().push(Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn receive(&mut self, _wait: Duration) -> Result<BytesMut> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        match self.reads.lock().pop_front() {
            Some(MockRead::Data(data)) => Ok(BytesMut::from(&data[..])),
            Some(MockRead::Timeout) => Err(Error::ReadTimeout),
            Some(MockRead::Closed) | None => Err(Error::ConnectionClosed),
        }
    }

    fn remote_addr(&self) -> String {
        self.addr.clone()
    }
}
