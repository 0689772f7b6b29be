//! VICP frame structure and encoding/decoding

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::trace;

use crate::error::{Error, Result};

bitflags! {
    /// Operation byte of a VICP header
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u8 {
        /// Payload carries message data
        const DATA = 0x80;
        /// Instrument in remote mode
        const REMOTE = 0x40;
        /// Front panel locked out
        const LOCKOUT = 0x20;
        /// Device clear
        const CLEAR = 0x10;
        /// Service request (instrument to host only)
        const SRQ = 0x08;
        /// Request a serial poll reply
        const REQSEND = 0x04;
        /// Last frame of a logical message
        const EOI = 0x01;
    }
}

impl OpFlags {
    /// Flags sent with every host command
    pub const COMMAND: Self = Self::DATA.union(Self::REMOTE).union(Self::EOI);

    pub fn is_data(self) -> bool {
        self.contains(Self::DATA)
    }

    pub fn is_eoi(self) -> bool {
        self.contains(Self::EOI)
    }
}

/// VICP frame header
///
/// ```text
/// ┌──────────┬──────────┬──────────┬──────────┬─────────────────┐
/// │ Op flags │ Version  │ Sequence │ Reserved │     Length      │
/// │  1 byte  │  1 byte  │  1 byte  │  1 byte  │ 4 bytes (BE u32)│
/// └──────────┴──────────┴──────────┴──────────┴─────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub flags: OpFlags,
    pub version: u8,
    pub sequence: u8,
    pub length: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Protocol version written on outbound frames
    pub const VERSION: u8 = 0x01;

    /// Parse a header from the first 8 bytes of `buf`
    ///
    /// Unknown flag bits and foreign version numbers are kept as-is; the
    /// length field is the only thing the receiver acts on.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::FrameTooShort {
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }

        Ok(Self {
            flags: OpFlags::from_bits_retain(buf[0]),
            version: buf[1],
            sequence: buf[2],
            length: BigEndian::read_u32(&buf[4..8]),
        })
    }

    /// Append the encoded header to `buf`
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.flags.bits());
        buf.put_u8(self.version);
        buf.put_u8(self.sequence);
        buf.put_u8(0);
        buf.put_u32(self.length);
    }

    /// Size of the whole frame this header introduces
    pub fn frame_size(&self) -> usize {
        Self::SIZE + self.length as usize
    }
}

/// A single VICP frame
///
/// # Examples
///
/// ```
/// use scopecap_core::{Frame, OpFlags};
///
/// let frame = Frame::command(1, "*IDN?");
/// let encoded = frame.encode();
/// assert_eq!(encoded.len(), 8 + 5);
///
/// let decoded = Frame::decode(encoded).unwrap();
/// assert_eq!(decoded.flags, OpFlags::COMMAND);
/// assert_eq!(&decoded.payload[..], b"*IDN?");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: OpFlags,
    pub sequence: u8,
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame with arbitrary flags
    pub fn new(flags: OpFlags, sequence: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            flags,
            sequence,
            payload: payload.into(),
        }
    }

    /// Build the frame for a host command (DATA | REMOTE | EOI)
    pub fn command(sequence: u8, command: &str) -> Self {
        Self::new(
            OpFlags::COMMAND,
            sequence,
            Bytes::copy_from_slice(command.as_bytes()),
        )
    }

    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            flags: self.flags,
            version: FrameHeader::VERSION,
            sequence: self.sequence,
            length: self.payload.len() as u32,
        }
    }

    /// Encode frame to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header().write_to(&mut buf);
        buf.put_slice(&self.payload);
        buf
    }

    /// Decode exactly one frame from `buf`
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is shorter than the header, or if the
    /// bytes after the header differ in count from the declared length.
    pub fn decode(mut buf: BytesMut) -> Result<Self> {
        let header = FrameHeader::parse(&buf)?;
        buf.advance(FrameHeader::SIZE);

        if buf.len() != header.length as usize {
            return Err(Error::LengthMismatch {
                declared: header.length,
                actual: buf.len(),
            });
        }

        Ok(Self {
            flags: header.flags,
            sequence: header.sequence,
            payload: buf.freeze(),
        })
    }

    pub fn is_data(&self) -> bool {
        self.flags.is_data()
    }

    pub fn is_eoi(&self) -> bool {
        self.flags.is_eoi()
    }

    /// Get total frame size
    pub fn size(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("flags", &format!("0x{:02X}", self.flags.bits()))
            .field("sequence", &self.sequence)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[op=0x{:02X}](seq={}, len={}, eoi={})",
            self.flags.bits(),
            self.sequence,
            self.payload.len(),
            self.is_eoi()
        )
    }
}

/// Incremental frame splitter
///
/// Bytes read from the socket are pushed in as they arrive. Complete frames
/// are split off the front one at a time; anything belonging to a later
/// frame stays buffered.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes buffered but not yet returned as a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Split off the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<Frame> {
        let header = FrameHeader::parse(&self.buf).ok()?;
        if self.buf.len() < header.frame_size() {
            return None;
        }

        let raw = self.buf.split_to(FrameHeader::SIZE);
        trace!("Frame header: {}", hex::encode(&raw));

        let payload = self.buf.split_to(header.length as usize).freeze();
        Some(Frame {
            flags: header.flags,
            sequence: header.sequence,
            payload,
        })
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
