//! Generic-driver instrument abstraction
//!
//! Everything that is not native VICP goes through an [`Instrument`] opened
//! by an [`InstrumentBackend`] from a VISA-style resource string.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// An open SCPI session
#[async_trait]
pub trait Instrument: Send {
    /// Resource string the session was opened with
    fn resource(&self) -> &str;

    /// Send one command (the terminator is added by the implementation)
    async fn write(&mut self, command: &str) -> Result<()>;

    /// Read one newline-terminated text reply, without the terminator
    async fn read_line(&mut self) -> Result<String>;

    /// Read one binary reply with no text termination
    async fn read_raw(&mut self) -> Result<Bytes>;

    /// Send a query and read its text reply, trimmed
    async fn query(&mut self, command: &str) -> Result<String> {
        self.write(command).await?;
        Ok(self.read_line().await?.trim().to_string())
    }

    /// Close the session
    async fn close(&mut self) -> Result<()>;
}

/// Opens instrument sessions and enumerates resources
#[async_trait]
pub trait InstrumentBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Open `resource`, failing if it does not answer within `timeout`
    async fn open(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Instrument>>;

    /// Resources matching a VISA search expression such as `USB?*::INSTR`
    async fn list(&self, pattern: &str) -> Result<Vec<String>>;
}
