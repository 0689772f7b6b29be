//! VICP sequence numbering
//!
//! Each connection numbers its outbound frames 1, 2, ... 255, 1, 2, ...
//! Zero is never sent.

/// Per-connection sequence counter
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    last: u8,
}

impl SequenceCounter {
    /// First sequence number handed out
    pub const FIRST: u8 = 1;

    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Get next sequence number
    pub fn next(&mut self) -> u8 {
        self.last = (self.last % u8::MAX) + 1;
        self.last
    }

    /// Last number handed out (0 before the first command)
    pub fn last(&self) -> u8 {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = 0;
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
