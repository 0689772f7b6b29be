//! IEEE 488.2 definite-length arbitrary block
//!
//! ```text
//! #  N  d d d ... d  payload ...
//! │  │  └─ N ASCII digits: payload byte count
//! │  └──── one ASCII digit: how many length digits follow
//! └─────── block marker
//! ```
//!
//! Instruments wrap binary query replies in this header. Some firmware omits
//! or mangles it, so a header that does not parse is never an error: the
//! data is passed through untouched.

use tracing::warn;

/// Block marker byte
pub const BLOCK_MARKER: u8 = b'#';

/// Parsed block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockHeader {
    /// `#`, the digit count and the length digits
    header_len: usize,

    /// Declared payload size
    byte_count: usize,
}

impl BlockHeader {
    fn total_len(&self) -> usize {
        self.header_len + self.byte_count
    }
}

fn parse_header(data: &[u8]) -> Option<BlockHeader> {
    if data.first() != Some(&BLOCK_MARKER) {
        return None;
    }

    let digits = (*data.get(1)? as char).to_digit(10)? as usize;
    if digits == 0 {
        // "#0" is the indefinite-length form, not a definite block
        return None;
    }

    let length_field = data.get(2..2 + digits)?;
    if !length_field.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let byte_count = std::str::from_utf8(length_field).ok()?.parse().ok()?;
    Some(BlockHeader {
        header_len: 2 + digits,
        byte_count,
    })
}

/// Remove a `#N<digits>` block header, returning just the payload
///
/// Returns `data` unchanged if it does not start with `#`, or if the header
/// is malformed or announces more bytes than `data` holds. Bytes after the
/// announced payload (typically a trailing `\n`) are dropped.
///
/// # Examples
///
/// ```
/// use scopecap_core::block::strip_block_header;
///
/// assert_eq!(strip_block_header(b"#15hello\n"), b"hello");
/// assert_eq!(strip_block_header(b"BM raw bitmap"), b"BM raw bitmap");
/// ```
pub fn strip_block_header(data: &[u8]) -> &[u8] {
    let Some(header) = parse_header(data) else {
        return data;
    };

    match data.get(header.header_len..header.total_len()) {
        Some(payload) => payload,
        None => {
            warn!(
                "Block header declares {} payload bytes but only {} arrived; keeping data as-is",
                header.byte_count,
                data.len() - header.header_len
            );
            data
        }
    }
}

/// Total size (header + payload) of the block starting at `data`
///
/// `None` when `data` does not start with a complete, well-formed header.
/// The payload itself need not have arrived yet.
pub fn block_len(data: &[u8]) -> Option<usize> {
    parse_header(data).map(|h| h.total_len())
}
