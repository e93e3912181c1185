// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture engine

use std::fmt;

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Classification of a capture failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureErrorKind {
    /// Capture permission was never granted (or was revoked)
    PermissionDenied,
    /// Requested device does not exist (or vanished)
    DeviceNotFound,
    /// Device is held by another session or process
    DeviceBusy,
    /// Device cannot satisfy the requested quality envelope
    ConstraintUnsatisfiable,
    /// Live stream ended mid-session (unplugged, track ended)
    StreamInterrupted,
    /// Anything else
    Unknown,
}

impl CaptureErrorKind {
    /// Short stable name, used in logs and JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureErrorKind::PermissionDenied => "permission_denied",
            CaptureErrorKind::DeviceNotFound => "device_not_found",
            CaptureErrorKind::DeviceBusy => "device_busy",
            CaptureErrorKind::ConstraintUnsatisfiable => "constraint_unsatisfiable",
            CaptureErrorKind::StreamInterrupted => "stream_interrupted",
            CaptureErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture-layer error: a kind plus a human-readable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureError {
    pub kind: CaptureErrorKind,
    pub message: String,
}

impl CaptureError {
    pub fn new(kind: CaptureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::PermissionDenied, message)
    }

    pub fn device_not_found(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::DeviceNotFound, message)
    }

    pub fn device_busy(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::DeviceBusy, message)
    }

    pub fn constraint_unsatisfiable(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::ConstraintUnsatisfiable, message)
    }

    pub fn stream_interrupted(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::StreamInterrupted, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::Unknown, message)
    }

    /// Whether the error can be recovered in-process
    ///
    /// `DeviceBusy` is recovered with a forced teardown and settle delay,
    /// `ConstraintUnsatisfiable` by retrying with a looser quality tier.
    /// Everything else needs user action first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            CaptureErrorKind::DeviceBusy | CaptureErrorKind::ConstraintUnsatisfiable
        )
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CaptureErrorKind::PermissionDenied => {
                write!(f, "Camera permission denied: {}", self.message)
            }
            CaptureErrorKind::DeviceNotFound => write!(f, "Camera not found: {}", self.message),
            CaptureErrorKind::DeviceBusy => write!(f, "Camera is busy: {}", self.message),
            CaptureErrorKind::ConstraintUnsatisfiable => {
                write!(f, "Camera cannot satisfy constraints: {}", self.message)
            }
            CaptureErrorKind::StreamInterrupted => {
                write!(f, "Camera stream interrupted: {}", self.message)
            }
            CaptureErrorKind::Unknown => write!(f, "Camera error: {}", self.message),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let message = err.to_string();
        if let Some(code) = err.raw_os_error() {
            let kind = match code {
                libc::EACCES | libc::EPERM => Some(CaptureErrorKind::PermissionDenied),
                libc::ENOENT | libc::ENODEV | libc::ENXIO => Some(CaptureErrorKind::DeviceNotFound),
                libc::EBUSY => Some(CaptureErrorKind::DeviceBusy),
                libc::EINVAL | libc::ERANGE => Some(CaptureErrorKind::ConstraintUnsatisfiable),
                _ => None,
            };
            if let Some(kind) = kind {
                return CaptureError::new(kind, message);
            }
        }

        let kind = match err.kind() {
            ErrorKind::PermissionDenied => CaptureErrorKind::PermissionDenied,
            ErrorKind::NotFound => CaptureErrorKind::DeviceNotFound,
            ErrorKind::ResourceBusy => CaptureErrorKind::DeviceBusy,
            ErrorKind::InvalidInput => CaptureErrorKind::ConstraintUnsatisfiable,
            _ => CaptureErrorKind::Unknown,
        };
        CaptureError::new(kind, message)
    }
}

/// Per-iteration decode fault
///
/// Swallowed by the decode loop: a malformed or unreadable frame simply
/// yields no result for that tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFault {
    /// Frame buffer is shorter than its declared geometry
    MalformedFrame(String),
    /// Pixel format cannot be converted for decoding
    UnsupportedFormat(String),
    /// The decoder panicked or its task failed
    DecoderFailed(String),
}

impl fmt::Display for DecodeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeFault::MalformedFrame(msg) => write!(f, "Malformed frame: {}", msg),
            DecodeFault::UnsupportedFormat(msg) => write!(f, "Unsupported pixel format: {}", msg),
            DecodeFault::DecoderFailed(msg) => write!(f, "Decoder failed: {}", msg),
        }
    }
}

impl std::error::Error for DecodeFault {}

/// Errors from handing a finalized outcome to the reporting collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// The scanned code carried no identifier
    MissingIdentifier,
    /// No attraction/context id was configured for this session
    MissingContext,
    /// The collaborator answered with a non-success response
    Rejected(String),
    /// The collaborator could not be reached
    Transport(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::MissingIdentifier => write!(f, "Scanned code carries no identifier"),
            ReportError::MissingContext => write!(f, "No context id configured for reporting"),
            ReportError::Rejected(msg) => write!(f, "Scan report rejected: {}", msg),
            ReportError::Transport(msg) => write!(f, "Scan report failed: {}", msg),
        }
    }
}

impl std::error::Error for ReportError {}

/// Session-level error surfaced to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Capture failure (acquire or mid-session)
    Capture(CaptureError),
    /// Reporting the outcome failed
    Report(ReportError),
    /// Operation not valid in the current state
    InvalidState {
        operation: &'static str,
        state: String,
    },
    /// Session was stopped before producing an outcome
    Cancelled,
}

impl SessionError {
    /// The capture error kind, if this is a capture failure
    pub fn capture_kind(&self) -> Option<CaptureErrorKind> {
        match self {
            SessionError::Capture(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Capture(e) => write!(f, "{}", e),
            SessionError::Report(e) => write!(f, "{}", e),
            SessionError::InvalidState { operation, state } => {
                write!(f, "Cannot {} while session is {}", operation, state)
            }
            SessionError::Cancelled => write!(f, "Session stopped"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        SessionError::Capture(err)
    }
}

impl From<ReportError> for SessionError {
    fn from(err: ReportError) -> Self {
        SessionError::Report(err)
    }
}
