// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the device catalog

mod common;

use common::MockBackend;
use qr_checkin::backends::camera::{DeviceCatalog, DeviceRole, FacingMode, FrameSource};
use qr_checkin::constants::QualityTier;
use qr_checkin::errors::CaptureErrorKind;

#[test]
fn test_back_and_front_cameras() {
    let backend = MockBackend::new(&[("a", "Back Camera"), ("b", "Front Camera")]);
    let mut catalog = DeviceCatalog::new(backend.arc());

    let devices = catalog.list_devices().unwrap();
    let roles: Vec<DeviceRole> = devices.iter().map(|d| d.role).collect();
    assert_eq!(roles, vec![DeviceRole::Back, DeviceRole::Front]);
    assert_eq!(devices[0].facing_hint, FacingMode::Environment);
    assert_eq!(devices[1].facing_hint, FacingMode::User);
    assert_eq!(catalog.default_device(None).map(|d| d.id.as_str()), Some("a"));
}

#[test]
fn test_rear_camera_sorts_first() {
    let backend = MockBackend::new(&[
        ("usb-1", "Integrated Webcam"),
        ("x", ""),
        ("f", "Front Camera"),
        ("r", "Rear Camera"),
    ]);
    let mut catalog = DeviceCatalog::new(backend.arc());

    let ids: Vec<String> = catalog
        .list_devices()
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["r", "f", "usb-1", "x"]);
    assert_eq!(catalog.default_device(None).map(|d| d.id.as_str()), Some("r"));
    assert_eq!(
        catalog.default_device(Some("f")).map(|d| d.id.as_str()),
        Some("f")
    );
    assert_eq!(
        catalog.default_device(Some("gone")).map(|d| d.id.as_str()),
        Some("r")
    );
}

#[test]
fn test_unlabelled_device_uses_id() {
    let backend = MockBackend::new(&[("camera-environment-0", ""), ("cam7", "")]);
    let mut catalog = DeviceCatalog::new(backend.arc());

    let devices = catalog.list_devices().unwrap();
    assert_eq!(devices[0].role, DeviceRole::Back);
    assert_eq!(devices[1].role, DeviceRole::Unknown);
    assert_eq!(devices[1].facing_hint, FacingMode::Unknown);
}

#[test]
fn test_next_after_wraps() {
    let backend = MockBackend::new(&[("a", "Back Camera"), ("b", "Front Camera")]);
    let mut catalog = DeviceCatalog::new(backend.arc());
    catalog.list_devices().unwrap();

    assert_eq!(catalog.next_after("a").map(|d| d.id.as_str()), Some("b"));
    assert_eq!(catalog.next_after("b").map(|d| d.id.as_str()), Some("a"));
    assert_eq!(catalog.next_after("zzz").map(|d| d.id.as_str()), Some("a"));
}

#[test]
fn test_enumeration_does_not_disturb_live_stream() {
    let backend = MockBackend::new(&[("a", "Back Camera"), ("b", "Front Camera")]);
    let source = FrameSource::new(backend.arc());
    let mut catalog = DeviceCatalog::new(backend.arc());

    let first = catalog.list_devices().unwrap();
    let handle = source
        .acquire(first.first(), QualityTier::Medium, FacingMode::Environment)
        .unwrap();

    let second = catalog.list_devices().unwrap();
    assert_eq!(first, second);
    assert!(handle.is_live());
    assert_eq!(backend.events().len(), 1);

    source.release(Some(&handle));
}

#[test]
fn test_permission_denied() {
    let backend = MockBackend::new(&[("a", "Back Camera")]);
    backend.deny_enumeration();
    let mut catalog = DeviceCatalog::new(backend.arc());

    let err = catalog.list_devices().unwrap_err();
    assert_eq!(err.kind, CaptureErrorKind::PermissionDenied);
}
