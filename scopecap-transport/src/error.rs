//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Resource not supported by the {backend} backend: {resource}")]
    UnsupportedResource {
        backend: &'static str,
        resource: String,
    },

    #[error("VISA error: {0}")]
    Visa(String),

    #[error("Protocol error: {0}")]
    Core(#[from] scopecap_core::Error),
}

impl Error {
    /// Errors that mark the end of an instrument's reply rather than a fault
    ///
    /// Instruments often close the socket, or simply stop sending, once the
    /// last byte of an image is out.
    pub fn ends_stream(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::ReadTimeout | Self::Io(_)
        )
    }
}
