// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures: an in-memory capture backend and a marker decoder

#![allow(dead_code)]

use image::GrayImage;
use qr_checkin::backends::camera::{
    BackendKind, CaptureBackend, Frame, LiveStream, RawDevice, StreamRequest,
};
use qr_checkin::config::ScannerConfig;
use qr_checkin::constants::QualityTier;
use qr_checkin::errors::{CaptureError, CaptureResult, DecodeFault};
use qr_checkin::frame_processor::{DecodeResult, QuadCorners, SymbolDecoder};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::ThreadId;

/// Grey level that never decodes
pub const BLANK: u8 = 0;

/// Something that happened on the mock hardware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquire { device: String, quality: QualityTier },
    Release { device: String },
}

#[derive(Default)]
struct MockState {
    devices: Vec<RawDevice>,
    events: Vec<Event>,
    live: usize,
    max_live: usize,
    busy_failures: usize,
    enumerate_error: Option<CaptureError>,
    /// Grey levels served before the filler frames
    script: Vec<u8>,
    /// Served frames after which the stream ends, if any
    interrupt_after: Option<usize>,
    served: usize,
    torch: bool,
    /// Threads that ran an enumeration
    enumerated_on: Vec<ThreadId>,
}

/// In-memory backend recording every acquire and release
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new(devices: &[(&str, &str)]) -> Self {
        let backend = Self::default();
        backend.state().devices = devices
            .iter()
            .map(|(id, label)| RawDevice::new(*id, *label))
            .collect();
        backend
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn arc(&self) -> Arc<dyn CaptureBackend> {
        Arc::new(self.clone())
    }

    /// Frames served by every stream, in order, before blank filler
    pub fn script_frames(&self, levels: &[u8]) {
        self.state().script = levels.to_vec();
    }

    pub fn fail_busy(&self, times: usize) {
        self.state().busy_failures = times;
    }

    pub fn deny_enumeration(&self) {
        self.state().enumerate_error = Some(CaptureError::permission_denied("not granted"));
    }

    pub fn interrupt_after(&self, frames: usize) {
        self.state().interrupt_after = Some(frames);
    }

    pub fn with_torch(&self) {
        self.state().torch = true;
    }

    pub fn remove_device(&self, id: &str) {
        self.state().devices.retain(|d| d.id != id);
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn live(&self) -> usize {
        self.state().live
    }

    pub fn max_live(&self) -> usize {
        self.state().max_live
    }

    pub fn enumerated_on(&self) -> Vec<ThreadId> {
        self.state().enumerated_on.clone()
    }

    /// Frames handed out over all streams
    pub fn served(&self) -> usize {
        self.state().served
    }
}

impl CaptureBackend for MockBackend {
    fn enumerate_devices(&self) -> CaptureResult<Vec<RawDevice>> {
        let mut state = self.state();
        state.enumerated_on.push(std::thread::current().id());
        match &state.enumerate_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.devices.clone()),
        }
    }

    fn open_stream(&self, request: &StreamRequest) -> CaptureResult<Box<dyn LiveStream>> {
        let mut state = self.state();
        if state.busy_failures > 0 {
            state.busy_failures -= 1;
            return Err(CaptureError::device_busy("held by another process"));
        }

        let device = match &request.device_id {
            Some(id) => state
                .devices
                .iter()
                .find(|d| &d.id == id)
                .cloned()
                .ok_or_else(|| CaptureError::device_not_found(id.clone()))?,
            None => state
                .devices
                .first()
                .cloned()
                .ok_or_else(|| CaptureError::device_not_found("no devices"))?,
        };

        state.events.push(Event::Acquire {
            device: device.id.clone(),
            quality: request.quality,
        });
        state.live += 1;
        state.max_live = state.max_live.max(state.live);

        Ok(Box::new(MockStream {
            device_id: device.id,
            script: state.script.iter().copied().collect(),
            torch: state.torch,
            stopped: false,
            backend: Arc::clone(&self.state),
        }))
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Still
    }
}

struct MockStream {
    device_id: String,
    script: VecDeque<u8>,
    torch: bool,
    stopped: bool,
    backend: Arc<Mutex<MockState>>,
}

impl LiveStream for MockStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn next_frame(&mut self) -> CaptureResult<Option<Frame>> {
        if self.stopped {
            return Err(CaptureError::stream_interrupted("stopped"));
        }
        let mut state = self.backend.lock().unwrap();
        if state.interrupt_after.is_some_and(|n| state.served >= n) {
            return Err(CaptureError::stream_interrupted("device unplugged"));
        }
        let level = self.script.pop_front().unwrap_or(BLANK);
        let sequence = state.served as u64;
        state.served += 1;
        Ok(Some(gray_frame(level, sequence)))
    }

    fn has_torch(&self) -> bool {
        self.torch
    }

    fn set_torch(&mut self, _on: bool) -> CaptureResult<()> {
        Ok(())
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        let mut state = self.backend.lock().unwrap();
        state.live -= 1;
        state.events.push(Event::Release {
            device: self.device_id.clone(),
        });
    }

    fn is_live(&self) -> bool {
        !self.stopped
    }
}

/// Small uniform grey frame
pub fn gray_frame(level: u8, sequence: u64) -> Frame {
    Frame::from_gray(8, 8, vec![level; 64], sequence)
}

/// Decoder that "finds" a symbol when the top-left pixel has a known level
pub struct MarkerDecoder {
    markers: Vec<(u8, String)>,
}

impl MarkerDecoder {
    pub fn new(markers: &[(u8, &str)]) -> Arc<Self> {
        Arc::new(Self {
            markers: markers
                .iter()
                .map(|(level, text)| (*level, text.to_string()))
                .collect(),
        })
    }
}

impl SymbolDecoder for MarkerDecoder {
    fn decode(&self, luma: &GrayImage) -> Result<Option<DecodeResult>, DecodeFault> {
        let level = luma.get_pixel(0, 0)[0];
        Ok(self
            .markers
            .iter()
            .find(|(marker, _)| marker.abs_diff(level) <= 1)
            .map(|(_, text)| DecodeResult {
                raw_text: text.clone(),
                geometry: QuadCorners::default(),
                size_hint: 21,
            }))
    }
}

/// Config with fast ticks and a short settle delay
pub fn fast_config() -> ScannerConfig {
    ScannerConfig {
        frame_interval_ms: 1,
        settle_delay_ms: 5,
        ..ScannerConfig::default()
    }
}
