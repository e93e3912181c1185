// SPDX-License-Identifier: GPL-3.0-only

//! Session state and the observable snapshot

use crate::backends::camera::CaptureDevice;
use crate::constants::QualityTier;
use crate::errors::CaptureError;
use crate::frame_processor::ScanOutcome;
use uuid::Uuid;

/// Capture session state
///
/// ```text
/// Idle → Requesting → Streaming → Scanning → {Success | Stopped | Error} → Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No device held, no loop running
    Idle,
    /// Acquiring a stream
    Requesting,
    /// Stream live, waiting for the first usable frame
    Streaming,
    /// Decode loop running
    Scanning,
    Success,
    Stopped,
    Error,
}

impl SessionState {
    /// Whether a stream may be held in this state
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Requesting | SessionState::Streaming | SessionState::Scanning
        )
    }

    /// Whether this is one of the three terminal states
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Success | SessionState::Stopped | SessionState::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Requesting => "requesting",
            SessionState::Streaming => "streaming",
            SessionState::Scanning => "scanning",
            SessionState::Success => "success",
            SessionState::Stopped => "stopped",
            SessionState::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a UI observes about the session
///
/// `error` and `outcome` keep the result of the last finished session until
/// the next `start`; `last_terminal` says how that session ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: SessionState,
    pub device: Option<CaptureDevice>,
    pub quality: QualityTier,
    pub flash_on: bool,
    pub error: Option<CaptureError>,
    pub outcome: Option<ScanOutcome>,
    pub last_terminal: Option<SessionState>,
}

impl SessionSnapshot {
    pub fn new(quality: QualityTier) -> Self {
        Self {
            session_id: Uuid::nil(),
            state: SessionState::Idle,
            device: None,
            quality,
            flash_on: false,
            error: None,
            outcome: None,
            last_terminal: None,
        }
    }

    /// Whether the session `id` has run to completion
    pub fn finished(&self, id: Uuid) -> bool {
        self.session_id == id && self.state == SessionState::Idle && self.last_terminal.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classes() {
        assert!(SessionState::Scanning.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Error.is_terminal());
        assert!(!SessionState::Streaming.is_terminal());
    }

    #[test]
    fn test_finished_matches_session() {
        let mut snap = SessionSnapshot::new(QualityTier::Medium);
        let id = Uuid::new_v4();
        snap.session_id = id;
        assert!(!snap.finished(id));
        snap.last_terminal = Some(SessionState::Success);
        assert!(snap.finished(id));
        assert!(!snap.finished(Uuid::new_v4()));
    }
}
