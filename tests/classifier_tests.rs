// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the result classifier

use qr_checkin::frame_processor::classify::classify;
use qr_checkin::frame_processor::{Classifier, DecodeResult, Payload, QuadCorners, SemanticType};

fn decoded(text: &str) -> DecodeResult {
    DecodeResult {
        raw_text: text.to_string(),
        geometry: QuadCorners::default(),
        size_hint: 25,
    }
}

#[test]
fn test_json_and_pattern_identifiers() {
    let json = classify(&decoded(r#"{"order_traveler_id": 77}"#));
    assert_eq!(json.extracted_id, Some(77));
    assert_eq!(json.semantic_type, SemanticType::Text);

    let labelled = classify(&decoded("order_traveler_id: 77"));
    assert_eq!(labelled.extracted_id, Some(77));
}

#[test]
fn test_numeric_text() {
    let outcome = classify(&decoded("482913"));
    assert_eq!(outcome.extracted_id, Some(482913));
    assert_eq!(outcome.semantic_type, SemanticType::Text);
}

#[test]
fn test_prefix_wins_over_numeric_rule() {
    let outcome = classify(&decoded("tel:482913"));
    assert_eq!(outcome.semantic_type, SemanticType::Phone);
    assert_eq!(
        outcome.payload,
        Payload::Phone {
            number: "482913".to_string()
        }
    );
}

#[test]
fn test_url_outcome() {
    let outcome = classify(&decoded("https://example.com/ticket?orderTravelerId=5"));
    assert_eq!(outcome.semantic_type, SemanticType::Url);
    assert_eq!(outcome.raw_text, "https://example.com/ticket?orderTravelerId=5");
}

#[test]
fn test_classify_is_total() {
    let inputs = [
        String::new(),
        " ".to_string(),
        "{".to_string(),
        "[1, 2]".to_string(),
        r#"{"order_traveler_id": "abc"}"#.to_string(),
        r#"{"order_traveler_id": 1.5}"#.to_string(),
        "mailto:".to_string(),
        "mailto:?subject=%".to_string(),
        "WIFI:;;;".to_string(),
        "BEGIN:VCARD".to_string(),
        String::from_utf8_lossy(&[0xff, 0xfe, 0x00, 0x41]).into_owned(),
        "\u{1F600}order_traveler_id\u{1F600}".to_string(),
        "9".repeat(500),
    ];

    for input in &inputs {
        let outcome = classify(&decoded(input));
        assert_eq!(&outcome.raw_text, input);
        assert_eq!(outcome.extracted_id, None, "input {:?}", input);
    }
}

#[test]
fn test_custom_keys() {
    let classifier = Classifier::new(["ticket"]);
    assert_eq!(classifier.classify_text("ticket 12").extracted_id, Some(12));
    assert_eq!(
        classifier.classify_text("order_traveler_id: 77").extracted_id,
        None
    );
}

#[test]
fn test_outcome_serializes() {
    let outcome = classify(&decoded("WIFI:S:Lobby;T:WPA;P:secret;;"));
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["semantic_type"], "wifi");
    assert_eq!(json["payload"]["kind"], "wifi");
    assert_eq!(json["payload"]["ssid"], "Lobby");
}
