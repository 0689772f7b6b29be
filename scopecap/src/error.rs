//! High-level error types

use std::fmt;

use crate::session::{CaptureState, FailureStage};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] scopecap_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] scopecap_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] scopecap_types::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("No USB instrument found")]
    NoUsbInstrument,

    #[error("Invalid session state: cannot move from {from} to {to}")]
    InvalidSessionState { from: CaptureState, to: CaptureState },

    #[error("Capture failed at {stage}: {reason}")]
    Stage { stage: FailureStage, reason: String },

    #[error("All {} transport candidate(s) failed:{}", .attempts.len(), AttemptList(.attempts))]
    Exhausted { attempts: Vec<AttemptFailure> },
}

impl Error {
    /// Whether the selector should move on to the next candidate
    ///
    /// Everything that goes wrong while talking to one instrument is local to
    /// that candidate. Decode and write failures happen after the image is in
    /// hand, so retrying elsewhere cannot help.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Stage { stage, .. } => !matches!(stage, FailureStage::Decode | FailureStage::Write),
            Self::Transport(_) | Self::Core(_) => true,
            _ => false,
        }
    }

    /// Stage a failure happened at, if it came out of a capture attempt
    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// One candidate that did not produce an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub candidate: String,
    pub stage: FailureStage,
    pub reason: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed at {}: {}", self.candidate, self.stage, self.reason)
    }
}

struct AttemptList<'a>(&'a [AttemptFailure]);

impl fmt::Display for AttemptList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for attempt in self.0 {
            write!(f, "\n  - {}", attempt)?;
        }
        Ok(())
    }
}
