// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::constants::QualityTier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Physical role of a capture device, as classified by the device catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceRole {
    Back,
    Front,
    Webcam,
    Unknown,
}

impl DeviceRole {
    /// Sort rank: rear cameras first so default selection prefers them
    pub fn rank(&self) -> u8 {
        match self {
            DeviceRole::Back => 0,
            DeviceRole::Front => 1,
            DeviceRole::Webcam => 2,
            DeviceRole::Unknown => 3,
        }
    }
}

impl std::fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceRole::Back => write!(f, "back"),
            DeviceRole::Front => write!(f, "front"),
            DeviceRole::Webcam => write!(f, "webcam"),
            DeviceRole::Unknown => write!(f, "unknown"),
        }
    }
}

/// Facing mode of a camera relative to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Facing away from the operator (rear camera)
    #[default]
    Environment,
    /// Facing the operator (selfie camera)
    User,
    Unknown,
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::Environment => write!(f, "environment"),
            FacingMode::User => write!(f, "user"),
            FacingMode::Unknown => write!(f, "unknown"),
        }
    }
}

/// Raw device record as reported by a backend, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDevice {
    /// Backend-specific identifier (e.g., `/dev/video0`)
    pub id: String,
    /// Human-readable label; may be empty on privacy-restricted systems
    pub label: String,
}

impl RawDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A classified capture device
///
/// Immutable snapshot produced by one catalog enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDevice {
    pub id: String,
    pub label: String,
    pub role: DeviceRole,
    pub facing_hint: FacingMode,
}

/// Parameters for acquiring a live stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Exact device id; when `None` the backend picks by `facing`
    pub device_id: Option<String>,
    pub quality: QualityTier,
    pub facing: FacingMode,
}

impl std::fmt::Display for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env = self.quality.envelope();
        match &self.device_id {
            Some(id) => write!(f, "device={} ", id)?,
            None => write!(f, "facing={} ", self.facing)?,
        }
        write!(
            f,
            "{}x{}@{}fps ({})",
            env.max_width,
            env.max_height,
            env.max_fps,
            self.quality
        )
    }
}

/// Pixel format of frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    Rgba,
    /// RGB24 - 24-bit RGB (3 bytes per pixel)
    Rgb24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A single frame from a live stream
///
/// Frames are handed to the decode loop one tick at a time and are not
/// retained afterwards.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Pixel data, row-major, `stride` bytes per row
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Monotonic sequence number within its stream
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl Frame {
    /// Build a tightly packed RGBA frame
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Rgba,
            stride: width * 4,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Build a tightly packed grayscale frame
    pub fn from_gray(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: width,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Whether the buffer is large enough for the declared geometry
    pub fn is_complete(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let row = self.width as usize * self.format.bytes_per_pixel();
        if (self.stride as usize) < row {
            return false;
        }
        let needed = self.stride as usize * (self.height as usize - 1) + row;
        self.data.len() >= needed
    }
}
