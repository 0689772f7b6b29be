//! Capture session state
//!
//! One session covers one capture invocation. Each transport candidate runs
//! through the same sequence of states:
//!
//! ```text
//! Idle -> Connecting -> Identifying -> Configuring -> Triggering
//!      -> Receiving -> Decoding -> Writing -> Done
//! ```
//!
//! Any non-terminal state may drop to `Failed(stage)`. A failed candidate
//! hands the session back to `Idle` for the next one.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use tracing::{debug, trace};

use scopecap_core::Vendor;

use crate::error::{Error, Result};
use crate::selector::Candidate;

/// Step a capture attempt failed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    Connect,
    Identify,
    /// Identity did not match any known vendor, or not one that speaks VICP
    VendorMismatch,
    Configure,
    Trigger,
    Receive,
    Decode,
    Write,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Identify => "identify",
            Self::VendorMismatch => "vendor mismatch",
            Self::Configure => "configure",
            Self::Trigger => "trigger",
            Self::Receive => "receive",
            Self::Decode => "decode",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// Capture session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Connecting,
    Identifying,
    Configuring,
    Triggering,
    Receiving,
    Decoding,
    Writing,
    Done,
    Failed(FailureStage),
}

impl CaptureState {
    /// The only state reachable by moving forward
    pub fn next(self) -> Option<Self> {
        use CaptureState::*;

        match self {
            Idle => Some(Connecting),
            Connecting => Some(Identifying),
            Identifying => Some(Configuring),
            Configuring => Some(Triggering),
            Triggering => Some(Receiving),
            Receiving => Some(Decoding),
            Decoding => Some(Writing),
            Writing => Some(Done),
            Done | Failed(_) => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Stage reported when an attempt fails while in this state
    pub fn stage(self) -> Option<FailureStage> {
        use CaptureState::*;

        match self {
            Idle | Connecting => Some(FailureStage::Connect),
            Identifying => Some(FailureStage::Identify),
            Configuring => Some(FailureStage::Configure),
            Triggering => Some(FailureStage::Trigger),
            Receiving => Some(FailureStage::Receive),
            Decoding => Some(FailureStage::Decode),
            Writing => Some(FailureStage::Write),
            Done => None,
            Failed(stage) => Some(stage),
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(stage) => write!(f, "Failed({})", stage),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// State of one capture invocation
#[derive(Debug)]
pub struct CaptureSession {
    state: CaptureState,
    candidate: String,
    transport: Option<Candidate>,
    vendor: Vendor,
    image: Bytes,
    output: PathBuf,
}

impl CaptureSession {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            state: CaptureState::Idle,
            candidate: String::new(),
            transport: None,
            vendor: Vendor::Unknown,
            image: Bytes::new(),
            output: output.into(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Candidate currently being attempted
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    /// Transport that produced the image
    pub fn transport(&self) -> Option<&Candidate> {
        self.transport.as_ref()
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Received image, block header still attached
    pub fn image(&self) -> &Bytes {
        &self.image
    }

    pub fn output(&self) -> &PathBuf {
        &self.output
    }

    /// Start an attempt on `candidate`
    ///
    /// Only allowed from `Idle` or after a failed attempt.
    pub fn begin(&mut self, candidate: impl Into<String>) -> Result<()> {
        if !matches!(self.state, CaptureState::Idle | CaptureState::Failed(_)) {
            return Err(Error::InvalidSessionState {
                from: self.state,
                to: CaptureState::Idle,
            });
        }

        self.candidate = candidate.into();
        self.transport = None;
        self.vendor = Vendor::Unknown;
        self.image = Bytes::new();
        self.state = CaptureState::Idle;

        debug!("Capture attempt: {}", self.candidate);
        Ok(())
    }

    /// Move one step forward
    pub fn advance(&mut self, to: CaptureState) -> Result<()> {
        if self.state.next() != Some(to) {
            return Err(Error::InvalidSessionState { from: self.state, to });
        }

        trace!("Capture state {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Drop to `Failed(stage)` and build the error describing it
    ///
    /// From a terminal state the state is left alone and an invalid-state
    /// error comes back instead.
    pub fn fail(&mut self, stage: FailureStage, reason: impl fmt::Display) -> Error {
        if self.state.is_terminal() {
            return Error::InvalidSessionState {
                from: self.state,
                to: CaptureState::Failed(stage),
            };
        }

        debug!("Capture {} failed at {}: {}", self.candidate, stage, reason);
        self.state = CaptureState::Failed(stage);
        Error::Stage {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Unwrap `result`, failing the attempt at `stage` on error
    pub fn check<T, E: fmt::Display>(
        &mut self,
        stage: FailureStage,
        result: std::result::Result<T, E>,
    ) -> Result<T> {
        result.map_err(|e| self.fail(stage, e))
    }

    pub fn set_transport(&mut self, transport: Candidate) {
        self.transport = Some(transport);
    }

    pub fn set_vendor(&mut self, vendor: Vendor) {
        self.vendor = vendor;
    }

    pub fn set_image(&mut self, image: Bytes) {
        self.image = image;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at_receiving() -> CaptureSession {
        let mut session = CaptureSession::new("out.png");
        session.begin("VICP 10.0.0.5:1861").unwrap();
        for state in [
            CaptureState::Connecting,
            CaptureState::Identifying,
            CaptureState::Configuring,
            CaptureState::Triggering,
            CaptureState::Receiving,
        ] {
            session.advance(state).unwrap();
        }
        session
    }

    #[test]
    fn test_full_forward_path() {
        let mut session = at_receiving();
        session.advance(CaptureState::Decoding).unwrap();
        session.advance(CaptureState::Writing).unwrap();
        session.advance(CaptureState::Done).unwrap();

        assert_eq!(session.state(), CaptureState::Done);
        assert!(session.state().is_terminal());
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut session = CaptureSession::new("out.png");

        let err = session.advance(CaptureState::Receiving).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSessionState {
                from: CaptureState::Idle,
                to: CaptureState::Receiving
            }
        ));
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[test]
    fn test_cannot_move_backwards() {
        let mut session = at_receiving();
        assert!(session.advance(CaptureState::Configuring).is_err());
    }

    #[test]
    fn test_fail_then_next_candidate() {
        let mut session = at_receiving();
        session.set_image(Bytes::from_static(b"ack"));

        let err = session.fail(FailureStage::Receive, "3 bytes");
        assert_eq!(err.stage(), Some(FailureStage::Receive));
        assert_eq!(session.state(), CaptureState::Failed(FailureStage::Receive));

        session.begin("TCPIP::10.0.0.5::inst0::INSTR").unwrap();
        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(session.candidate(), "TCPIP::10.0.0.5::inst0::INSTR");
        assert!(session.image().is_empty());
    }

    #[test]
    fn test_begin_mid_attempt_rejected() {
        let mut session = at_receiving();
        assert!(session.begin("other").is_err());
    }

    #[test]
    fn test_no_failure_after_done() {
        let mut session = at_receiving();
        session.advance(CaptureState::Decoding).unwrap();
        session.advance(CaptureState::Writing).unwrap();
        session.advance(CaptureState::Done).unwrap();

        let err = session.fail(FailureStage::Write, "late");
        assert!(matches!(err, Error::InvalidSessionState { .. }));
        assert_eq!(session.state(), CaptureState::Done);
    }

    #[test]
    fn test_stage_for_state() {
        assert_eq!(CaptureState::Connecting.stage(), Some(FailureStage::Connect));
        assert_eq!(CaptureState::Writing.stage(), Some(FailureStage::Write));
        assert_eq!(CaptureState::Done.stage(), None);
        assert_eq!(FailureStage::VendorMismatch.to_string(), "vendor mismatch");
    }
}
