// SPDX-License-Identifier: GPL-3.0-only

//! Device catalog
//!
//! Enumerates capture devices through a backend and classifies each one by
//! role and facing. Classification is best-effort string matching: there is
//! no authoritative OS signal, and devices without a usable label or id fall
//! back to `Unknown`.

use super::types::{CaptureDevice, DeviceRole, FacingMode, RawDevice};
use super::CaptureBackend;
use crate::errors::CaptureResult;
use std::sync::Arc;
use tracing::{debug, info};

/// Keyword groups, checked in order; the first group that matches wins
const KEYWORD_GROUPS: [(&[&str], DeviceRole, FacingMode); 3] = [
    (
        &["back", "rear", "environment"],
        DeviceRole::Back,
        FacingMode::Environment,
    ),
    (&["front", "user"], DeviceRole::Front, FacingMode::User),
    (
        &["webcam", "external"],
        DeviceRole::Webcam,
        FacingMode::Environment,
    ),
];

/// Match a label or id against the keyword groups
fn match_keywords(text: &str) -> Option<(DeviceRole, FacingMode)> {
    let lower = text.to_lowercase();
    if lower.trim().is_empty() {
        return None;
    }
    KEYWORD_GROUPS
        .iter()
        .find(|(keywords, _, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, role, facing)| (*role, *facing))
}

/// Classify a raw device record
///
/// The label is inspected first; if it is empty or matches no keyword the
/// device id is inspected with the same keywords; otherwise the device is
/// `Unknown`/`Unknown`.
pub fn classify(raw: &RawDevice) -> CaptureDevice {
    let (role, facing_hint) = match_keywords(&raw.label)
        .or_else(|| match_keywords(&raw.id))
        .unwrap_or((DeviceRole::Unknown, FacingMode::Unknown));

    CaptureDevice {
        id: raw.id.clone(),
        label: raw.label.clone(),
        role,
        facing_hint,
    }
}

/// Classify and order a set of raw devices
///
/// Ordering is Back, Front, Webcam, Unknown; devices with the same role keep
/// their enumeration order.
pub fn classify_all(raw: &[RawDevice]) -> Vec<CaptureDevice> {
    let mut devices: Vec<CaptureDevice> = raw.iter().map(classify).collect();
    devices.sort_by_key(|d| d.role.rank());
    devices
}

/// Device catalog over a capture backend
///
/// Holds the snapshot of the last enumeration. Re-enumerating replaces the
/// snapshot and never touches a live stream.
pub struct DeviceCatalog {
    backend: Arc<dyn CaptureBackend>,
    devices: Vec<CaptureDevice>,
}

impl DeviceCatalog {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            devices: Vec::new(),
        }
    }

    /// Enumerate, classify and sort devices
    ///
    /// Fails with `PermissionDenied` if capture permission was never granted.
    pub fn list_devices(&mut self) -> CaptureResult<Vec<CaptureDevice>> {
        let raw = self.backend.enumerate_devices()?;
        Ok(self.update(&raw))
    }

    /// Backend used for enumeration
    ///
    /// Lets async callers run the enumeration on a blocking thread and hand
    /// the result to [`DeviceCatalog::update`].
    pub fn backend(&self) -> Arc<dyn CaptureBackend> {
        Arc::clone(&self.backend)
    }

    /// Classify and sort a fresh enumeration, replacing the cached one
    pub fn update(&mut self, raw: &[RawDevice]) -> Vec<CaptureDevice> {
        let devices = classify_all(raw);

        for device in &devices {
            debug!(
                id = %device.id,
                label = %device.label,
                role = %device.role,
                facing = %device.facing_hint,
                "Classified capture device"
            );
        }
        info!(count = devices.len(), backend = %self.backend.backend_kind(), "Enumerated capture devices");

        self.devices = devices.clone();
        devices
    }

    /// Devices from the last enumeration
    pub fn devices(&self) -> &[CaptureDevice] {
        &self.devices
    }

    /// Look up a device by id in the last enumeration
    pub fn find(&self, id: &str) -> Option<&CaptureDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Default selection: the preferred id if present, else the first device
    pub fn default_device(&self, preferred: Option<&str>) -> Option<&CaptureDevice> {
        preferred
            .and_then(|id| self.find(id))
            .or_else(|| self.devices.first())
    }

    /// The device after `current_id` in catalog order, wrapping around
    ///
    /// If `current_id` is not in the catalog the first device is returned.
    pub fn next_after(&self, current_id: &str) -> Option<&CaptureDevice> {
        if self.devices.is_empty() {
            return None;
        }
        let next_index = match self.devices.iter().position(|d| d.id == current_id) {
            Some(index) => (index + 1) % self.devices.len(),
            None => 0,
        };
        self.devices.get(next_index)
    }
}
