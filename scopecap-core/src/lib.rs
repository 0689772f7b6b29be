//! # scopecap-core
//!
//! Core protocol implementation for oscilloscope screen capture.
//!
//! This crate provides the low-level protocol primitives:
//! - VICP frame structure and encoding/decoding
//! - Per-connection sequence numbering
//! - IEEE 488.2 block header stripping
//! - Vendor detection and capture command profiles
//! - VISA resource string helpers

pub mod block;
pub mod constants;
pub mod error;
pub mod frame;
pub mod resource;
pub mod sequence;
pub mod vendor;

pub use block::strip_block_header;
pub use constants::Delays;
pub use error::{Error, Result};
pub use frame::{Frame, FrameDecoder, FrameHeader, OpFlags};
pub use sequence::SequenceCounter;
pub use vendor::{Background, ResponseFormat, Vendor, VendorProfile};

/// VICP protocol version written in every outbound header
pub const PROTOCOL_VERSION: u8 = FrameHeader::VERSION;

/// Default VICP port
pub const DEFAULT_PORT: u16 = constants::VICP_PORT;

/// Frame header size
pub const HEADER_SIZE: usize = FrameHeader::SIZE;
