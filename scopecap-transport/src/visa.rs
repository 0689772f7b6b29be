//! System VISA backend (feature `visa`)
//!
//! Delegates VXI-11, HiSLIP, USB-TMC and socket resources to the installed
//! VISA library through `visa-rs`. VISA calls block, so they run under
//! `block_in_place` and need the multi-threaded runtime.

use std::ffi::CString;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::block_in_place;
use tracing::debug;
use visa_rs::attribute::AttrTmoValue;
use visa_rs::prelude::*;

use crate::blocking::BlockingReader;
use crate::error::*;
use crate::instrument::{Instrument, InstrumentBackend};

fn visa_err(e: impl std::fmt::Display) -> Error {
    Error::Visa(e.to_string())
}

fn res_id(resource: &str) -> Result<ResID> {
    let name = CString::new(resource).map_err(visa_err)?;
    Ok(name.into())
}

/// `VI_ATTR_TMO_VALUE` in milliseconds
fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// Session opened through the system VISA library
pub struct VisaInstrument {
    resource: String,
    inner: Option<BlockingReader<visa_rs::Instrument>>,
}

impl VisaInstrument {
    fn session(&mut self) -> Result<&mut BlockingReader<visa_rs::Instrument>> {
        self.inner.as_mut().ok_or(Error::NotConnected)
    }
}

#[async_trait]
impl Instrument for VisaInstrument {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn write(&mut self, command: &str) -> Result<()> {
        debug!("VISA write [{}]: {}", self.resource, command);
        let session = self.session()?;
        block_in_place(|| session.write_line(command))
    }

    async fn read_line(&mut self) -> Result<String> {
        let session = self.session()?;
        block_in_place(|| session.read_line())
    }

    async fn read_raw(&mut self) -> Result<Bytes> {
        let session = self.session()?;
        block_in_place(|| session.read_raw())
    }

    async fn close(&mut self) -> Result<()> {
        // the session is released on drop
        self.inner.take();
        Ok(())
    }
}

/// Backend over the default VISA resource manager
pub struct VisaBackend {
    rm: DefaultRM,
}

impl VisaBackend {
    pub fn new() -> Result<Self> {
        let rm = DefaultRM::new().map_err(visa_err)?;
        Ok(Self { rm })
    }
}

#[async_trait]
impl InstrumentBackend for VisaBackend {
    fn name(&self) -> &'static str {
        "visa"
    }

    async fn open(&self, resource: &str, timeout: Duration) -> Result<Box<dyn Instrument>> {
        let id = res_id(resource)?;
        let inner = block_in_place(|| self.rm.open(&id, AccessMode::NO_LOCK, timeout))
            .map_err(visa_err)?;

        // I/O timeout for every later read and write, not just the open
        let millis = timeout_millis(timeout);
        let tmo = AttrTmoValue::new_checked(millis)
            .ok_or_else(|| Error::Visa(format!("timeout {} ms out of range", millis)))?;
        inner.set_attr(tmo).map_err(visa_err)?;
        debug!("VISA open [{}]: I/O timeout {} ms", resource, millis);

        Ok(Box::new(VisaInstrument {
            resource: resource.to_string(),
            inner: Some(BlockingReader::new(inner)),
        }))
    }

    async fn list(&self, pattern: &str) -> Result<Vec<String>> {
        let expr = res_id(pattern)?;

        block_in_place(|| {
            let mut found = Vec::new();
            let mut list = self.rm.find_res_list(&expr).map_err(visa_err)?;
            while let Some(resource) = list.find_next().map_err(visa_err)? {
                found.push(resource.to_string());
            }
            Ok(found)
        })
    }
}
