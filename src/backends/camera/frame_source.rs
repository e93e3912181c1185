// SPDX-License-Identifier: GPL-3.0-only

//! Frame source: exclusive acquisition and release of live camera streams
//!
//! The frame source turns a device + quality tier into a live stream handle
//! and guarantees that at most one stream is live at any time. Switching
//! devices is never a live reconfiguration: the current handle must be
//! released (fully torn down) before the next `acquire`.

use super::types::{CaptureDevice, FacingMode, Frame, StreamRequest};
use super::{CaptureBackend, LiveStream};
use crate::constants::QualityTier;
use crate::errors::{CaptureError, CaptureResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Shared slot holding a live stream until it is released
struct StreamSlot {
    handle_id: u64,
    device_id: String,
    stream: Mutex<Option<Box<dyn LiveStream>>>,
    /// Frame pulled by a readiness check, handed out by the next read
    pending: Mutex<Option<Frame>>,
}

impl StreamSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn LiveStream>>> {
        self.stream.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pending(&self) -> MutexGuard<'_, Option<Frame>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle to a live stream
///
/// Cloning the handle does not duplicate the stream; all clones refer to the
/// same hardware stream and observe its release.
#[derive(Clone)]
pub struct StreamHandle {
    slot: Arc<StreamSlot>,
}

impl StreamHandle {
    /// Unique id of this acquisition
    pub fn id(&self) -> u64 {
        self.slot.handle_id
    }

    /// Device backing the stream
    pub fn device_id(&self) -> &str {
        &self.slot.device_id
    }

    /// Whether the stream is still held (not released)
    pub fn is_live(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|s| s.is_live())
    }

    /// Reader used by the decode loop to pull frames
    pub fn reader(&self) -> FrameReader {
        FrameReader {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.slot.handle_id)
            .field("device_id", &self.slot.device_id)
            .finish()
    }
}

/// Frame pull side of a stream handle
#[derive(Clone)]
pub struct FrameReader {
    slot: Arc<StreamSlot>,
}

impl FrameReader {
    /// Take the newest complete frame, if any
    ///
    /// Fails with `StreamInterrupted` once the stream has ended or been
    /// released.
    pub fn next_frame(&self) -> CaptureResult<Option<Frame>> {
        let mut guard = self.slot.lock();
        let Some(stream) = guard.as_mut() else {
            return Err(CaptureError::stream_interrupted(format!(
                "stream {} was released",
                self.slot.handle_id
            )));
        };
        if let Some(frame) = self.slot.pending().take() {
            return Ok(Some(frame));
        }
        stream.next_frame()
    }

    /// Whether a complete frame is available, without consuming it
    ///
    /// The frame found here is returned by the next `next_frame` call.
    pub fn poll_ready(&self) -> CaptureResult<bool> {
        let mut guard = self.slot.lock();
        let Some(stream) = guard.as_mut() else {
            return Err(CaptureError::stream_interrupted(format!(
                "stream {} was released",
                self.slot.handle_id
            )));
        };
        let mut pending = self.slot.pending();
        if pending.is_some() {
            return Ok(true);
        }
        match stream.next_frame()? {
            Some(frame) if frame.is_complete() => {
                *pending = Some(frame);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Acquires and releases live streams on a capture backend
#[derive(Clone)]
pub struct FrameSource {
    backend: Arc<dyn CaptureBackend>,
    /// Handle id of the currently live stream
    live: Arc<Mutex<Option<u64>>>,
    next_id: Arc<AtomicU64>,
}

impl FrameSource {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            live: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn live_guard(&self) -> MutexGuard<'_, Option<u64>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire a live stream
    ///
    /// Requests the exact device id when a device is given, and the facing
    /// mode otherwise. Fails with `PermissionDenied`, `DeviceNotFound`,
    /// `DeviceBusy` or `ConstraintUnsatisfiable`. Acquiring while another
    /// stream is still live is refused with `DeviceBusy`.
    pub fn acquire(
        &self,
        device: Option<&CaptureDevice>,
        quality: QualityTier,
        facing: FacingMode,
    ) -> CaptureResult<StreamHandle> {
        let request = StreamRequest {
            device_id: device.map(|d| d.id.clone()),
            quality,
            facing,
        };

        // Holding the guard across open_stream serializes acquisitions
        let mut live = self.live_guard();
        if let Some(live_id) = *live {
            warn!(live_id, request = %request, "Refusing acquire while a stream is live");
            return Err(CaptureError::device_busy(format!(
                "stream {} is still live; release it before acquiring",
                live_id
            )));
        }

        info!(request = %request, "Acquiring camera stream");
        let stream = self.backend.open_stream(&request)?;

        let handle_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let device_id = stream.device_id().to_string();
        *live = Some(handle_id);

        info!(handle_id, device = %device_id, "Camera stream acquired");
        Ok(StreamHandle {
            slot: Arc::new(StreamSlot {
                handle_id,
                device_id,
                stream: Mutex::new(Some(stream)),
                pending: Mutex::new(None),
            }),
        })
    }

    /// Release a stream
    ///
    /// Stops all tracks and returns once the hardware is released. Safe to
    /// call on `None` or on an already released handle.
    pub fn release(&self, handle: Option<&StreamHandle>) {
        let Some(handle) = handle else {
            return;
        };

        let stream = handle.slot.lock().take();
        handle.slot.pending().take();
        match stream {
            Some(mut stream) => {
                debug!(handle_id = handle.id(), "Stopping camera stream");
                stream.stop();
                info!(handle_id = handle.id(), device = %handle.device_id(), "Camera stream released");
            }
            None => debug!(handle_id = handle.id(), "Stream already released"),
        }

        let mut live = self.live_guard();
        if *live == Some(handle.id()) {
            *live = None;
        }
    }

    /// Switch the torch on the stream, best-effort
    ///
    /// Returns `false` when the device has no torch, the handle is released,
    /// or the hardware refused; never fails.
    pub fn apply_torch(&self, handle: Option<&StreamHandle>, on: bool) -> bool {
        let Some(handle) = handle else {
            return false;
        };
        let mut guard = handle.slot.lock();
        let Some(stream) = guard.as_mut() else {
            return false;
        };
        if !stream.has_torch() {
            debug!(device = %handle.device_id(), "Device has no torch");
            return false;
        }
        match stream.set_torch(on) {
            Ok(()) => true,
            Err(e) => {
                warn!(device = %handle.device_id(), error = %e, "Failed to switch torch");
                false
            }
        }
    }

    /// Number of streams currently live (0 or 1)
    pub fn live_streams(&self) -> usize {
        usize::from(self.live_guard().is_some())
    }

    /// The backend this source acquires from
    pub fn backend(&self) -> &Arc<dyn CaptureBackend> {
        &self.backend
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("backend", &self.backend.backend_kind())
            .field("live", &*self.live_guard())
            .finish()
    }
}
