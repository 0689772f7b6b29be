//! Instrument identification

use std::fmt;

use crate::error::{Error, Result};

/// Parsed `*IDN?` reply
///
/// `<manufacturer>,<model>,<serial>,<firmware>`; fields an instrument leaves
/// out are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentIdentity {
    /// Reply as received, trimmed
    pub raw: String,

    pub manufacturer: String,

    pub model: String,

    pub serial_number: String,

    pub firmware_version: String,
}

impl InstrumentIdentity {
    /// Split an identification reply into its fields
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty reply.
    pub fn parse(idn: &str) -> Result<Self> {
        let raw = idn.trim();
        if raw.is_empty() {
            return Err(Error::Validation("empty identification reply".into()));
        }

        let mut fields = raw.splitn(4, ',').map(|f| f.trim().to_string());
        Ok(Self {
            raw: raw.to_string(),
            manufacturer: fields.next().unwrap_or_default(),
            model: fields.next().unwrap_or_default(),
            serial_number: fields.next().unwrap_or_default(),
            firmware_version: fields.next().unwrap_or_default(),
        })
    }
}

impl fmt::Display for InstrumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Instrument[{} {}, SN: {}, FW: {}]",
            self.manufacturer, self.model, self.serial_number, self.firmware_version
        )
    }
}
