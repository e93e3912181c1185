// SPDX-License-Identifier: GPL-3.0-only

//! Engine-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture quality tiers
///
/// Each tier maps to a fixed resolution and frame rate envelope. The tier is
/// chosen by the caller and can only change while the session is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// 320–640 × 240–480 @ 10–15 fps
    Low,
    /// 640–1280 × 480–720 @ 15–24 fps (default)
    #[default]
    Medium,
    /// 1280–1920 × 720–1080 @ 20–30 fps
    High,
}

/// Inclusive resolution/frame-rate envelope of a quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub min_fps: u32,
    pub max_fps: u32,
}

impl Envelope {
    /// Check whether a negotiated resolution falls inside this envelope
    pub fn contains(&self, width: u32, height: u32) -> bool {
        (self.min_width..=self.max_width).contains(&width)
            && (self.min_height..=self.max_height).contains(&height)
    }

    /// Check whether a negotiated frame rate falls inside this envelope
    pub fn contains_fps(&self, fps: u32) -> bool {
        (self.min_fps..=self.max_fps).contains(&fps)
    }

    /// Preferred (ideal) resolution: the top of the envelope
    pub fn ideal_size(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    /// Preferred frame rate: the top of the envelope
    pub fn ideal_fps(&self) -> u32 {
        self.max_fps
    }
}

impl QualityTier {
    /// All tiers, ordered from loosest to tightest
    pub const ALL: [QualityTier; 3] = [QualityTier::Low, QualityTier::Medium, QualityTier::High];

    /// Get display name for the tier
    pub fn display_name(&self) -> &'static str {
        match self {
            QualityTier::Low => "Low",
            QualityTier::Medium => "Medium",
            QualityTier::High => "High",
        }
    }

    /// Get the constraint envelope for this tier
    pub fn envelope(&self) -> Envelope {
        match self {
            QualityTier::Low => Envelope {
                min_width: 320,
                max_width: 640,
                min_height: 240,
                max_height: 480,
                min_fps: 10,
                max_fps: 15,
            },
            QualityTier::Medium => Envelope {
                min_width: 640,
                max_width: 1280,
                min_height: 480,
                max_height: 720,
                min_fps: 15,
                max_fps: 24,
            },
            QualityTier::High => Envelope {
                min_width: 1280,
                max_width: 1920,
                min_height: 720,
                max_height: 1080,
                min_fps: 20,
                max_fps: 30,
            },
        }
    }

    /// The next looser tier, if any
    ///
    /// Used by callers retrying after `ConstraintUnsatisfiable`; the frame
    /// source never degrades on its own.
    pub fn looser(&self) -> Option<QualityTier> {
        match self {
            QualityTier::High => Some(QualityTier::Medium),
            QualityTier::Medium => Some(QualityTier::Low),
            QualityTier::Low => None,
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" | "med" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            other => Err(format!("unknown quality tier: {other}")),
        }
    }
}

/// Largest dimension (px) a frame may have when it reaches the decoder
pub const MAX_DECODE_DIMENSION: u32 = 1280;

/// Contrast gain applied by the enhanced decode passes
pub const CONTRAST_GAIN: f32 = 1.2;

/// Contrast pivot (mid-grey)
pub const CONTRAST_PIVOT: f32 = 128.0;

/// Nominal decode loop tick (≈60 Hz display refresh)
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Delay after a forced teardown before the device may be reacquired
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Identifier key spellings accepted by the classifier
pub const IDENTIFIER_KEYS: [&str; 2] = ["order_traveler_id", "orderTravelerId"];

/// Number of capture buffers requested from V4L2 devices
pub const V4L2_BUFFER_COUNT: u32 = 4;
