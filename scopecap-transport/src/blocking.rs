//! Reply framing over a blocking reader
//!
//! Driver libraries such as VISA hand out plain `std::io::Read` sessions.
//! A read returns fewer bytes than asked for only when the device signalled
//! END, so a short read ends a reply. Replies that fill the last chunk
//! exactly end on a complete IEEE block, or on the error of the read after
//! them (usually a timeout) once some data has arrived.

use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use scopecap_core::block::block_len;

use crate::error::Result;

/// Default read size, one USB-TMC bulk transfer worth of screen data
pub const DEFAULT_CHUNK: usize = 64 * 1024;

/// Blocking session with line and binary reply reads
pub struct BlockingReader<R> {
    inner: R,
    buf: BytesMut,
    chunk: usize,
}

impl<R: Read> BlockingReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_chunk(inner, DEFAULT_CHUNK)
    }

    pub fn with_chunk(inner: R, chunk: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            chunk: chunk.max(1),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// One read into the buffer; `Ok(true)` when the device signalled END
    fn fill(&mut self) -> io::Result<bool> {
        let mut chunk = vec![0u8; self.chunk];
        let n = self.inner.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..n]);
        trace!("Blocking read: {} bytes ({} buffered)", n, self.buf.len());
        Ok(n < chunk.len())
    }

    /// Text reply up to `\n`, without the terminator
    pub fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                return Ok(String::from_utf8_lossy(&line[..pos]).into_owned());
            }

            match self.fill() {
                Ok(false) => {}
                Ok(true) => {
                    if self.buf.contains(&b'\n') {
                        continue;
                    }
                    let line = self.buf.split();
                    return Ok(String::from_utf8_lossy(&line).into_owned());
                }
                Err(e) if !self.buf.is_empty() => {
                    debug!("Line read ended ({}) at {} bytes", e, self.buf.len());
                    let line = self.buf.split();
                    return Ok(String::from_utf8_lossy(&line).into_owned());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Binary reply, including any bytes left over from a line read
    pub fn read_raw(&mut self) -> Result<Bytes> {
        loop {
            if let Some(total) = block_len(&self.buf) {
                if self.buf.len() >= total {
                    let block = self.buf.split_to(total).freeze();
                    if self.buf.first() == Some(&b'\n') {
                        let _ = self.buf.split_to(1);
                    }
                    return Ok(block);
                }
            }

            match self.fill() {
                Ok(false) => {}
                Ok(true) => return Ok(self.buf.split().freeze()),
                Err(e) if !self.buf.is_empty() => {
                    debug!("Raw read ended ({}) at {} bytes", e, self.buf.len());
                    return Ok(self.buf.split().freeze());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: Read + Write> BlockingReader<R> {
    /// Send `command` with a `\n` terminator
    pub fn write_line(&mut self, command: &str) -> Result<()> {
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');
        self.inner.write_all(&line)?;
        self.inner.flush()?;
        Ok(())
    }
}
