// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  SessionController  │  ← State machine, sole owner of the live stream
//! └──────────┬──────────┘
//!            │
//!   ┌────────┴─────────┐
//!   ▼                  ▼
//! ┌──────────────┐ ┌──────────────┐
//! │DeviceCatalog │ │ FrameSource  │  ← Classification / acquire + release
//! └──────┬───────┘ └──────┬───────┘
//!        └────────┬───────┘
//!                 ▼
//! ┌─────────────────────┐
//! │ CaptureBackend Trait│  ← Common interface
//! └──────────┬──────────┘
//!       ┌────┴────┐
//!       ▼         ▼
//!    ┌─────┐  ┌───────┐
//!    │V4L2 │  │ Still │  ← Concrete implementations
//!    └─────┘  └───────┘
//! ```

pub mod catalog;
pub mod format_converters;
pub mod frame_loop;
pub mod frame_source;
pub mod still;
pub mod types;
pub mod v4l2;

pub use catalog::DeviceCatalog;
pub use frame_source::{FrameReader, FrameSource, StreamHandle};
pub use types::*;

use crate::config::ScannerConfig;
use crate::errors::CaptureResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Video4Linux2 capture devices
    #[default]
    V4l2,
    /// Still images served as a stream
    Still,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::V4l2 => write!(f, "V4L2"),
            BackendKind::Still => write!(f, "still"),
        }
    }
}

/// Media-capture backend
///
/// Backends only report raw devices and open streams. Classification,
/// ordering and the one-live-stream rule live above them.
pub trait CaptureBackend: Send + Sync {
    /// Enumerate capture devices
    ///
    /// Fails with `PermissionDenied` if capture permission was never
    /// granted. Must not disturb a stream that is currently live.
    fn enumerate_devices(&self) -> CaptureResult<Vec<RawDevice>>;

    /// Open a live stream
    ///
    /// Requests the exact `device_id` when given, otherwise the device
    /// matching `facing`. Never degrades the quality tier on its own.
    fn open_stream(&self, request: &StreamRequest) -> CaptureResult<Box<dyn LiveStream>>;

    /// Get the backend type identifier
    fn backend_kind(&self) -> BackendKind;
}

/// A live hardware stream
pub trait LiveStream: Send {
    /// Identifier of the device backing this stream
    fn device_id(&self) -> &str;

    /// Take the newest frame not yet handed out
    ///
    /// `Ok(None)` means no complete frame is available yet. An error means
    /// the stream ended (device unplugged, track ended).
    fn next_frame(&mut self) -> CaptureResult<Option<Frame>>;

    /// Whether the device exposes a controllable torch
    fn has_torch(&self) -> bool;

    /// Switch the torch on or off
    fn set_torch(&mut self, on: bool) -> CaptureResult<()>;

    /// Stop all tracks and close the device
    ///
    /// Returns only after the hardware has been released. Calling it again
    /// is a no-op.
    fn stop(&mut self);

    /// Whether the stream is still running
    fn is_live(&self) -> bool;
}

/// Get a concrete backend instance for the configured kind
pub fn get_backend(config: &ScannerConfig) -> Arc<dyn CaptureBackend> {
    match config.backend {
        BackendKind::V4l2 => Arc::new(v4l2::V4l2Backend::new()),
        BackendKind::Still => Arc::new(still::StillImageBackend::new(config.still_images.clone())),
    }
}
