// SPDX-License-Identifier: GPL-3.0-only

//! Core types for decode and classification results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point in native frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The four corners of a decoded symbol
///
/// Order is top-left, top-right, bottom-right, bottom-left relative to the
/// symbol itself, so a rotated code keeps its orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QuadCorners {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl QuadCorners {
    pub fn from_array(points: [Point; 4]) -> Self {
        Self {
            top_left: points[0],
            top_right: points[1],
            bottom_right: points[2],
            bottom_left: points[3],
        }
    }

    /// Multiply every coordinate by `factor`
    ///
    /// Maps corners found on a downsampled image back to the native frame.
    pub fn scaled(&self, factor: f32) -> Self {
        let s = |p: Point| Point::new(p.x * factor, p.y * factor);
        Self {
            top_left: s(self.top_left),
            top_right: s(self.top_right),
            bottom_right: s(self.bottom_right),
            bottom_left: s(self.bottom_left),
        }
    }

    /// Axis-aligned bounding box as (min_x, min_y, max_x, max_y)
    pub fn bounding_box(&self) -> (f32, f32, f32, f32) {
        let pts = [self.top_left, self.top_right, self.bottom_right, self.bottom_left];
        pts.iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }
}

/// A decoded symbol, before classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeResult {
    pub raw_text: String,
    pub geometry: QuadCorners,
    /// Symbol size in modules (21 for a version 1 QR code)
    pub size_hint: u32,
}

/// Semantic type of the decoded text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Url,
    Email,
    Phone,
    Wifi,
    VCard,
    /// Reserved; numeric text is classified as `Text` with an extracted id
    NumericId,
    Text,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SemanticType::Url => "URL",
            SemanticType::Email => "Email",
            SemanticType::Phone => "Phone",
            SemanticType::Wifi => "WiFi",
            SemanticType::VCard => "vCard",
            SemanticType::NumericId => "Numeric ID",
            SemanticType::Text => "Text",
        };
        f.write_str(name)
    }
}

/// WiFi security type parsed from a `WIFI:` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WifiSecurity {
    /// Open network
    None,
    Wep,
    /// WPA/WPA2 Personal
    Wpa,
    Wpa2Enterprise,
    Wpa3,
}

impl WifiSecurity {
    /// Parse the `T:` field
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "WEP" => Self::Wep,
            "WPA" | "WPA2" => Self::Wpa,
            "WPA2-EAP" | "WPA3-EAP" => Self::Wpa2Enterprise,
            "WPA3" | "SAE" => Self::Wpa3,
            "NOPASS" | "" => Self::None,
            // Unknown tags are almost always a WPA variant
            _ => Self::Wpa,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::None => "Open",
            Self::Wep => "WEP",
            Self::Wpa => "WPA/WPA2",
            Self::Wpa2Enterprise => "Enterprise",
            Self::Wpa3 => "WPA3",
        }
    }
}

/// Structured content of a scan, by semantic type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Payload {
    Url {
        url: String,
    },
    Email {
        address: String,
        subject: Option<String>,
        body: Option<String>,
    },
    Phone {
        number: String,
    },
    Wifi {
        ssid: String,
        password: Option<String>,
        security: WifiSecurity,
        hidden: bool,
    },
    VCard {
        card: String,
    },
    Text {
        text: String,
    },
}

/// Terminal artifact of a successful session
///
/// Produced once per session and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub raw_text: String,
    pub semantic_type: SemanticType,
    pub payload: Payload,
    pub extracted_id: Option<u64>,
    pub timestamp: DateTime<Utc>,
}
