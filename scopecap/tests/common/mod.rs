//! Scripted instruments shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use image::{ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;

use scopecap::{CaptureConfig, Dialer};
use scopecap_core::{Frame, OpFlags};
use scopecap_transport::{Error, Instrument, InstrumentBackend, MockTransport, Result, Transport};

/// Capture settings without settle/render waits
pub fn fast_config() -> CaptureConfig {
    CaptureConfig {
        timeout_secs: 1,
        settle_ms: Some(0),
        render_ms: Some(0),
        ..Default::default()
    }
}

/// A small real image in `format`
pub fn screenshot(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(32, 24, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 0x40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Wrap `payload` in a definite-length IEEE block
pub fn ieee_block(payload: &[u8]) -> Vec<u8> {
    let len = payload.len().to_string();
    let mut block = format!("#{}{}", len.len(), len).into_bytes();
    block.extend_from_slice(payload);
    block
}

/// VICP data frame, EOI on the last one
pub fn vicp_frame(seq: u8, payload: &[u8], eoi: bool) -> Bytes {
    let flags = if eoi { OpFlags::DATA | OpFlags::EOI } else { OpFlags::DATA };
    Frame::new(flags, seq, Bytes::copy_from_slice(payload)).encode().freeze()
}

/// Payload of every frame sent to a VICP mock, as text
pub fn vicp_commands(mock: &MockTransport) -> Vec<String> {
    mock.sent()
        .iter()
        .map(|frame| String::from_utf8_lossy(&frame[8..]).into_owned())
        .collect()
}

/// Queue `image` as a multi-frame VICP reply
pub fn push_vicp_image(mock: &MockTransport, image: &[u8], chunk: usize) {
    let chunks: Vec<&[u8]> = image.chunks(chunk).collect();
    for (i, part) in chunks.iter().enumerate() {
        mock.push_read(vicp_frame(i as u8 + 1, part, i + 1 == chunks.len()));
    }
}

/// Hands out scripted VICP transports per `host:port`, refusing the rest
#[derive(Default)]
pub struct MockDialer {
    transports: Mutex<HashMap<String, VecDeque<MockTransport>>>,
}

impl MockDialer {
    pub fn add(&self, host: &str, port: u16, transport: MockTransport) {
        self.transports
            .lock()
            .entry(format!("{}:{}", host, port))
            .or_default()
            .push_back(transport);
    }
}

impl Dialer for MockDialer {
    fn dial(&self, host: &str, port: u16, _timeout: Duration) -> Box<dyn Transport> {
        let addr = format!("{}:{}", host, port);
        let next = self.transports.lock().get_mut(&addr).and_then(VecDeque::pop_front);
        Box::new(next.unwrap_or_else(|| MockTransport::new(addr).refusing()))
    }
}

/// Scripted reply set for one resource
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub idn: String,
    pub replies: Vec<Bytes>,
}

impl Script {
    pub fn new(idn: &str) -> Self {
        Self {
            idn: idn.to_string(),
            replies: Vec::new(),
        }
    }

    pub fn reply(mut self, data: impl Into<Bytes>) -> Self {
        self.replies.push(data.into());
        self
    }
}

/// Backend serving scripted instruments
#[derive(Default)]
pub struct FakeBackend {
    scripts: Mutex<HashMap<String, Script>>,
    usb: Vec<String>,
    opened: Arc<Mutex<Vec<String>>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn with(mut self, resource: &str, script: Script) -> Self {
        self.scripts.get_mut().insert(resource.to_string(), script);
        self
    }

    pub fn with_usb(mut self, resource: &str) -> Self {
        self.usb.push(resource.to_string());
        self
    }

    /// Every resource `open` was called with
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    /// Every command written, across all sessions
    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }
}

struct ScriptedInstrument {
    resource: String,
    idn: String,
    replies: VecDeque<Bytes>,
    written: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Instrument for ScriptedInstrument {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn write(&mut self, command: &str) -> Result<()> {
        self.written.lock().push(command.to_string());
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        Ok(self.idn.clone())
    }

    async fn read_raw(&mut self) -> Result<Bytes> {
        self.replies.pop_front().ok_or(Error::ReadTimeout)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl InstrumentBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn open(&self, resource: &str, _timeout: Duration) -> Result<Box<dyn Instrument>> {
        self.opened.lock().push(resource.to_string());

        let script = self.scripts.lock().remove(resource).ok_or_else(|| Error::UnsupportedResource {
            backend: "fake",
            resource: resource.to_string(),
        })?;

        Ok(Box::new(ScriptedInstrument {
            resource: resource.to_string(),
            idn: script.idn,
            replies: script.replies.into(),
            written: Arc::clone(&self.written),
        }))
    }

    async fn list(&self, pattern: &str) -> Result<Vec<String>> {
        let suffix = pattern.trim_start_matches("USB?*");
        Ok(self
            .usb
            .iter()
            .filter(|r| suffix.is_empty() || r.ends_with(suffix))
            .cloned()
            .collect())
    }
}

/// Bytes of a reply too short to be an image
pub fn ack(len: usize) -> Bytes {
    let mut data = BytesMut::with_capacity(len);
    data.resize(len, b'0');
    data.freeze()
}
