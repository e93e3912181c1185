// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux2 capture backend
//!
//! Devices are the `/dev/video*` nodes that advertise single-planar video
//! capture. A stream owns its device on a dedicated capture thread which
//! negotiates the format, maps the buffers and publishes only the newest
//! converted frame. Torch control goes through the sysfs LED class.

use super::catalog;
use super::format_converters::{SourceFormat, buffer_to_frame};
use super::frame_loop::{CaptureLoopController, LoopContext};
use super::types::{FacingMode, Frame, RawDevice, StreamRequest};
use super::{BackendKind, CaptureBackend, LiveStream};
use crate::constants::{Envelope, V4L2_BUFFER_COUNT};
use crate::errors::{CaptureError, CaptureErrorKind, CaptureResult};
use crate::flash::TorchLeds;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Format, FourCC};

/// How long a blocking dequeue may wait before the stop signal is rechecked
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

/// Format and size agreed with the driver
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    format: SourceFormat,
    width: u32,
    height: u32,
    stride: u32,
}

/// V4L2 backend over `/dev/video*`
pub struct V4l2Backend {
    dev_dir: PathBuf,
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            dev_dir: PathBuf::from("/dev"),
        }
    }

    /// Candidate capture nodes, sorted by index
    fn video_nodes(&self) -> CaptureResult<Vec<PathBuf>> {
        let mut nodes: Vec<PathBuf> = std::fs::read_dir(&self.dev_dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("video"))
            })
            .collect();
        nodes.sort_by_key(|p| node_index(p));
        Ok(nodes)
    }

    /// Pick the device for a request without an explicit id
    fn device_for_facing(&self, facing: FacingMode) -> CaptureResult<String> {
        let devices = catalog::classify_all(&self.enumerate_devices()?);
        devices
            .iter()
            .find(|d| d.facing_hint == facing)
            .or_else(|| devices.first())
            .map(|d| d.id.clone())
            .ok_or_else(|| CaptureError::device_not_found("no video capture device present"))
    }
}

impl Default for V4l2Backend {
    fn default() -> Self {
        Self::new()
    }
}

fn node_index(path: &Path) -> u32 {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("video"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

impl CaptureBackend for V4l2Backend {
    fn enumerate_devices(&self) -> CaptureResult<Vec<RawDevice>> {
        let mut devices = Vec::new();
        let mut denied = 0usize;
        let nodes = self.video_nodes()?;

        for path in &nodes {
            let dev = match Device::with_path(path) {
                Ok(dev) => dev,
                Err(e) => {
                    let err = CaptureError::from(e);
                    if err.kind == CaptureErrorKind::PermissionDenied {
                        denied += 1;
                    }
                    debug!(path = %path.display(), error = %err, "Skipping video node");
                    continue;
                }
            };
            let caps = match dev.query_caps() {
                Ok(caps) => caps,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "QUERYCAP failed");
                    continue;
                }
            };
            // Metadata and output nodes share the video prefix
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(RawDevice::new(path.to_string_lossy(), caps.card.trim()));
        }

        if devices.is_empty() && denied > 0 && denied == nodes.len() {
            return Err(CaptureError::permission_denied(
                "no access to any video device; check membership of the video group",
            ));
        }
        Ok(devices)
    }

    fn open_stream(&self, request: &StreamRequest) -> CaptureResult<Box<dyn LiveStream>> {
        let device_id = match &request.device_id {
            Some(id) => {
                if !Path::new(id).exists() {
                    return Err(CaptureError::device_not_found(format!("{} does not exist", id)));
                }
                id.clone()
            }
            None => self.device_for_facing(request.facing)?,
        };
        V4l2Stream::open(device_id, request.quality.envelope())
            .map(|s| Box::new(s) as Box<dyn LiveStream>)
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::V4l2
    }
}

/// Newest frame published by the capture thread
#[derive(Default)]
struct LatestFrame {
    frame: Option<Frame>,
    error: Option<CaptureError>,
}

type SharedLatest = Arc<Mutex<LatestFrame>>;

fn lock(shared: &SharedLatest) -> MutexGuard<'_, LatestFrame> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// A live V4L2 capture stream
pub struct V4l2Stream {
    device_id: String,
    latest: SharedLatest,
    controller: Option<CaptureLoopController>,
    torch: TorchLeds,
    torch_on: bool,
}

impl V4l2Stream {
    /// Open `device_id` and start capturing inside `envelope`
    ///
    /// Returns once the device is streaming, or with the error the driver
    /// reported while opening, negotiating or mapping buffers.
    fn open(device_id: String, envelope: Envelope) -> CaptureResult<Self> {
        let latest: SharedLatest = Arc::new(Mutex::new(LatestFrame::default()));
        let path = device_id.clone();
        let shared = Arc::clone(&latest);

        let name = format!("v4l2-{}", device_id.trim_start_matches("/dev/"));
        let controller = CaptureLoopController::spawn(&name, move |ctx| {
            capture_thread(ctx, &path, envelope, &shared);
        })?;

        Ok(Self {
            device_id,
            latest,
            controller: Some(controller),
            torch: TorchLeds::discover(),
            torch_on: false,
        })
    }
}

impl LiveStream for V4l2Stream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn next_frame(&mut self) -> CaptureResult<Option<Frame>> {
        let mut latest = lock(&self.latest);
        if let Some(frame) = latest.frame.take() {
            return Ok(Some(frame));
        }
        match &latest.error {
            Some(e) => Err(e.clone()),
            None => Ok(None),
        }
    }

    fn has_torch(&self) -> bool {
        self.torch.has_devices()
    }

    fn set_torch(&mut self, on: bool) -> CaptureResult<()> {
        self.torch.set(on)?;
        self.torch_on = on;
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut controller) = self.controller.take() else {
            return;
        };
        if self.torch_on {
            let _ = self.torch.set(false);
            self.torch_on = false;
        }
        controller.stop();
        let mut latest = lock(&self.latest);
        latest.frame = None;
        latest.error = Some(CaptureError::stream_interrupted("stream stopped"));
        info!(device = %self.device_id, "V4L2 stream stopped");
    }

    fn is_live(&self) -> bool {
        self.controller.as_ref().is_some_and(|c| c.is_running())
            && lock(&self.latest).error.is_none()
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Frames per second for a `numerator/denominator` second frame interval
fn interval_fps(numerator: u32, denominator: u32) -> Option<u32> {
    if numerator == 0 {
        return None;
    }
    Some((denominator as f64 / numerator as f64).round() as u32)
}

/// Capture thread body: open, negotiate, map, then publish frames
fn capture_thread(ctx: &mut LoopContext, path: &str, envelope: Envelope, latest: &SharedLatest) {
    let dev = match Device::with_path(path) {
        Ok(dev) => dev,
        Err(e) => return ctx.fail(CaptureError::from(e)),
    };

    let negotiated = match negotiate_format(&dev, &envelope) {
        Ok(n) => n,
        Err(e) => return ctx.fail(e),
    };

    let fps = envelope.ideal_fps();
    match dev.set_params(&Parameters::with_fps(fps)) {
        Ok(params) => {
            let interval = params.interval;
            match interval_fps(interval.numerator, interval.denominator) {
                Some(actual) if envelope.contains_fps(actual) => {
                    debug!(fps = actual, "Frame interval set")
                }
                actual => warn!(
                    requested = fps,
                    actual = ?actual,
                    min = envelope.min_fps,
                    max = envelope.max_fps,
                    "Negotiated frame rate is outside the quality tier"
                ),
            }
        }
        Err(e) => warn!(fps, error = %e, "Driver refused frame interval, using its default"),
    }

    // Buffer allocation is where a device held elsewhere reports EBUSY
    let mut stream = match MmapStream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFER_COUNT) {
        Ok(stream) => stream,
        Err(e) => return ctx.fail(CaptureError::from(e)),
    };
    stream.set_timeout(DEQUEUE_TIMEOUT);

    info!(
        path,
        format = ?negotiated.format,
        width = negotiated.width,
        height = negotiated.height,
        "V4L2 capture started"
    );
    ctx.ready();

    let mut dropped = 0u64;
    while !ctx.should_stop() {
        let (buf, meta) = match stream.next() {
            Ok(frame) => frame,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                warn!(path, error = %e, "V4L2 dequeue failed, ending stream");
                lock(latest).error = Some(CaptureError::stream_interrupted(format!(
                    "{}: {}",
                    path, e
                )));
                break;
            }
        };

        let used = (meta.bytesused as usize).min(buf.len());
        let data = if used > 0 { &buf[..used] } else { buf };
        match buffer_to_frame(
            negotiated.format,
            data,
            negotiated.width,
            negotiated.height,
            negotiated.stride,
            u64::from(meta.sequence),
        ) {
            Some(frame) => lock(latest).frame = Some(frame),
            None => {
                dropped += 1;
                if dropped % 30 == 1 {
                    debug!(path, dropped, "Dropped incomplete capture buffer");
                }
            }
        }
    }
}

/// Choose a pixel format and size inside `envelope`
///
/// Formats are tried in `SourceFormat::PREFERRED` order. The driver may
/// adjust the requested size; a result outside the envelope is reported as
/// `ConstraintUnsatisfiable` rather than silently accepted.
fn negotiate_format(dev: &Device, envelope: &Envelope) -> CaptureResult<Negotiated> {
    let supported: Vec<FourCC> = dev.enum_formats()?.into_iter().map(|d| d.fourcc).collect();

    let mut last_size = None;
    for code in SourceFormat::PREFERRED {
        let fourcc = FourCC::new(code);
        if !supported.contains(&fourcc) {
            continue;
        }
        let Some(format) = SourceFormat::from_fourcc(code) else {
            continue;
        };

        let (width, height) = pick_size(dev, fourcc, envelope).unwrap_or(envelope.ideal_size());
        let actual = match dev.set_format(&Format::new(width, height, fourcc)) {
            Ok(actual) => actual,
            Err(e) => {
                debug!(fourcc = ?fourcc, error = %e, "Format rejected");
                continue;
            }
        };

        if actual.fourcc != fourcc {
            continue;
        }
        if !envelope.contains(actual.width, actual.height) {
            last_size = Some((actual.width, actual.height));
            continue;
        }

        return Ok(Negotiated {
            format,
            width: actual.width,
            height: actual.height,
            stride: actual.stride,
        });
    }

    Err(match last_size {
        Some((w, h)) => CaptureError::constraint_unsatisfiable(format!(
            "device offers {}x{}, outside {}-{}x{}-{}",
            w, h, envelope.min_width, envelope.max_width, envelope.min_height, envelope.max_height
        )),
        None => CaptureError::constraint_unsatisfiable("device offers no usable pixel format"),
    })
}

/// Largest advertised size inside the envelope, if the driver enumerates sizes
fn pick_size(dev: &Device, fourcc: FourCC, envelope: &Envelope) -> Option<(u32, u32)> {
    let sizes = dev.enum_framesizes(fourcc).ok()?;
    let mut best: Option<(u32, u32)> = None;
    for size in sizes {
        let candidate = match size.size {
            v4l::framesize::FrameSizeEnum::Discrete(d) => (d.width, d.height),
            v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                let (w, h) = envelope.ideal_size();
                (
                    w.clamp(step.min_width, step.max_width),
                    h.clamp(step.min_height, step.max_height),
                )
            }
        };
        if !envelope.contains(candidate.0, candidate.1) {
            continue;
        }
        if best.is_none_or(|(bw, bh)| candidate.0 * candidate.1 > bw * bh) {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_index_orders_numerically() {
        let mut nodes = vec![
            PathBuf::from("/dev/video10"),
            PathBuf::from("/dev/video2"),
            PathBuf::from("/dev/video0"),
        ];
        nodes.sort_by_key(|p| node_index(p));
        assert_eq!(nodes[0], PathBuf::from("/dev/video0"));
        assert_eq!(nodes[2], PathBuf::from("/dev/video10"));
    }

    #[test]
    fn test_interval_fps_against_tier() {
        let envelope = crate::constants::QualityTier::Medium.envelope();
        assert_eq!(interval_fps(1, 30), Some(30));
        assert_eq!(interval_fps(1001, 30000), Some(30));
        assert_eq!(interval_fps(0, 30), None);
        assert!(envelope.contains_fps(interval_fps(1, 24).unwrap()));
        assert!(!envelope.contains_fps(interval_fps(1, 5).unwrap()));
    }

    #[test]
    fn test_missing_device_id_is_not_found() {
        let backend = V4l2Backend::new();
        let request = StreamRequest {
            device_id: Some("/dev/video-does-not-exist".to_string()),
            quality: crate::constants::QualityTier::Low,
            facing: FacingMode::Environment,
        };
        let err = backend.open_stream(&request).err().unwrap();
        assert_eq!(err.kind, CaptureErrorKind::DeviceNotFound);
    }

    #[test]
    fn test_empty_dev_dir_enumerates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = V4l2Backend {
            dev_dir: dir.path().to_path_buf(),
        };
        assert!(backend.enumerate_devices().unwrap().is_empty());
    }
}
