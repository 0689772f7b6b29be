//! Error types for scopecap-core



/// Result type alias for scopecap-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// Declared payload length disagrees with the bytes present
    #[error("Frame length mismatch: header declares {declared} bytes, buffer holds {actual} bytes")]
    LengthMismatch {
        declared: u32,
        actual: usize,
    },

    /// Option value outside its allowed set
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Resource string could not be interpreted
    #[error("Invalid resource string: {0}")]
    InvalidResource(String),
}

impl Error {
    /// Check if more bytes from the stream could complete the frame
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::FrameTooShort { .. })
    }
}
