// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use qr_checkin::constants::{CONTRAST_GAIN, IDENTIFIER_KEYS, MAX_DECODE_DIMENSION, QualityTier};

#[test]
fn test_quality_tier_values() {
    // Low, Medium, High
    assert_eq!(QualityTier::ALL.len(), 3);
}

#[test]
fn test_tier_envelopes_match_table() {
    let low = QualityTier::Low.envelope();
    assert_eq!((low.min_width, low.max_width), (320, 640));
    assert_eq!((low.min_height, low.max_height), (240, 480));
    assert_eq!((low.min_fps, low.max_fps), (10, 15));

    let medium = QualityTier::Medium.envelope();
    assert_eq!((medium.min_width, medium.max_width), (640, 1280));
    assert_eq!((medium.min_height, medium.max_height), (480, 720));
    assert_eq!((medium.min_fps, medium.max_fps), (15, 24));

    let high = QualityTier::High.envelope();
    assert_eq!((high.min_width, high.max_width), (1280, 1920));
    assert_eq!((high.min_height, high.max_height), (720, 1080));
    assert_eq!((high.min_fps, high.max_fps), (20, 30));
}

#[test]
fn test_ideal_size_stays_inside_envelope() {
    for tier in QualityTier::ALL {
        let env = tier.envelope();
        let (w, h) = env.ideal_size();
        assert!(env.contains(w, h), "{} ideal size outside envelope", tier);
        assert!(env.contains_fps(env.ideal_fps()));
    }
}

#[test]
fn test_decode_constants() {
    assert_eq!(MAX_DECODE_DIMENSION, 1280);
    assert!((CONTRAST_GAIN - 1.2).abs() < f32::EPSILON);
    assert_eq!(IDENTIFIER_KEYS, ["order_traveler_id", "orderTravelerId"]);
}
