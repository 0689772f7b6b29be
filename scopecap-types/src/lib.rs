//! Type definitions for scopecap

pub mod connection;
pub mod error;
pub mod identity;
pub mod scan;

pub use connection::ConnectionMode;
pub use error::{Error, Result};
pub use identity::InstrumentIdentity;
pub use scan::{ScanEntry, ScanKind, ScanReport};
