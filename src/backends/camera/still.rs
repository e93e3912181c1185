// SPDX-License-Identifier: GPL-3.0-only

//! Still-image capture backend
//!
//! Serves a fixed list of image files as a single looping stream. Used to
//! scan codes from photos and screenshots, and on machines without a
//! camera.

use super::types::{Frame, RawDevice, StreamRequest};
use super::{BackendKind, CaptureBackend, LiveStream};
use crate::errors::{CaptureError, CaptureResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Device id reported for the image list
pub const STILL_DEVICE_ID: &str = "still:0";

/// Load an image file as an RGBA frame
pub fn load_image_frame(path: &Path, sequence: u64) -> CaptureResult<Frame> {
    if !path.exists() {
        return Err(CaptureError::device_not_found(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let img = image::open(path).map_err(|e| {
        CaptureError::unknown(format!("cannot decode {}: {}", path.display(), e))
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(path = %path.display(), width, height, "Loaded still image");
    Ok(Frame::from_rgba(width, height, rgba.into_raw(), sequence))
}

/// Backend over a list of image files
pub struct StillImageBackend {
    images: Vec<PathBuf>,
}

impl StillImageBackend {
    pub fn new(images: Vec<PathBuf>) -> Self {
        Self { images }
    }
}

impl CaptureBackend for StillImageBackend {
    fn enumerate_devices(&self) -> CaptureResult<Vec<RawDevice>> {
        if self.images.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![RawDevice::new(
            STILL_DEVICE_ID,
            format!("Still images ({} external files)", self.images.len()),
        )])
    }

    fn open_stream(&self, request: &StreamRequest) -> CaptureResult<Box<dyn LiveStream>> {
        if let Some(id) = &request.device_id
            && id != STILL_DEVICE_ID
        {
            return Err(CaptureError::device_not_found(format!("no still device {}", id)));
        }
        if self.images.is_empty() {
            return Err(CaptureError::device_not_found("no still images configured"));
        }

        let frames = self
            .images
            .iter()
            .enumerate()
            .map(|(i, path)| load_image_frame(path, i as u64))
            .collect::<CaptureResult<Vec<_>>>()?;

        info!(count = frames.len(), quality = %request.quality, "Still image stream opened");
        Ok(Box::new(StillStream {
            frames,
            position: 0,
            sequence: 0,
            stopped: false,
        }))
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Still
    }
}

/// Loops over the loaded frames, one per pull
struct StillStream {
    frames: Vec<Frame>,
    position: usize,
    sequence: u64,
    stopped: bool,
}

impl LiveStream for StillStream {
    fn device_id(&self) -> &str {
        STILL_DEVICE_ID
    }

    fn next_frame(&mut self) -> CaptureResult<Option<Frame>> {
        if self.stopped {
            return Err(CaptureError::stream_interrupted("still stream stopped"));
        }
        let Some(template) = self.frames.get(self.position) else {
            return Ok(None);
        };
        let mut frame = template.clone();
        frame.sequence = self.sequence;
        frame.captured_at = std::time::Instant::now();
        self.sequence += 1;
        self.position = (self.position + 1) % self.frames.len();
        Ok(Some(frame))
    }

    fn has_torch(&self) -> bool {
        false
    }

    fn set_torch(&mut self, _on: bool) -> CaptureResult<()> {
        Err(CaptureError::unknown("still images have no torch"))
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.frames.clear();
    }

    fn is_live(&self) -> bool {
        !self.stopped
    }
}
