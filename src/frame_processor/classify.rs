// SPDX-License-Identifier: GPL-3.0-only

//! Result classifier
//!
//! Turns decoded text into a [`ScanOutcome`]. Classification is a total
//! function: malformed input yields a `Text` outcome without an identifier,
//! never an error.
//!
//! Semantic type, by prefix, first match wins:
//!
//! | prefix | type |
//! |---|---|
//! | `http://`, `https://` | URL |
//! | `mailto:` | Email |
//! | `tel:` | Phone |
//! | `WIFI:` | WiFi |
//! | `BEGIN:VCARD` | vCard |
//! | anything else | Text |
//!
//! The identifier is extracted independently: a JSON object field under
//! one of the accepted keys, else `key[:\s]*(\d+)`, else the whole text if
//! it is all digits.

use super::types::{DecodeResult, Payload, ScanOutcome, SemanticType, WifiSecurity};
use crate::constants::IDENTIFIER_KEYS;
use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

/// Classifier with a fixed set of accepted identifier keys
#[derive(Debug, Clone)]
pub struct Classifier {
    keys: Vec<String>,
    patterns: Vec<Regex>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(IDENTIFIER_KEYS.iter().copied())
    }
}

impl Classifier {
    /// Build a classifier accepting the given key spellings
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let patterns = keys
            .iter()
            .filter_map(|key| {
                let pattern = format!(r"{}[:\s]*(\d+)", regex::escape(key));
                match Regex::new(&pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Ignoring identifier key");
                        None
                    }
                }
            })
            .collect();
        Self { keys, patterns }
    }

    /// Classify a decode result
    pub fn classify(&self, result: &DecodeResult) -> ScanOutcome {
        self.classify_text(&result.raw_text)
    }

    /// Classify raw decoded text
    pub fn classify_text(&self, raw: &str) -> ScanOutcome {
        let (semantic_type, payload) = parse_payload(raw);
        let extracted_id = self.extract_id(raw);
        debug!(%semantic_type, ?extracted_id, "Classified scan");

        ScanOutcome {
            raw_text: raw.to_string(),
            semantic_type,
            payload,
            extracted_id,
            timestamp: Utc::now(),
        }
    }

    /// Extract the numeric identifier, if any
    pub fn extract_id(&self, raw: &str) -> Option<u64> {
        let trimmed = raw.trim();

        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
            return self.keys.iter().find_map(|key| match map.get(key)? {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => parse_digits(s.trim()),
                _ => None,
            });
        }

        if let Some(id) = self.patterns.iter().find_map(|re| {
            re.captures(trimmed)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok())
        }) {
            return Some(id);
        }

        parse_digits(trimmed)
    }
}

/// Classify with the default key spellings
pub fn classify(result: &DecodeResult) -> ScanOutcome {
    Classifier::default().classify(result)
}

/// Parse a non-empty all-digit string
fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Prefix rules match the raw text; surrounding whitespace is not stripped
fn parse_payload(text: &str) -> (SemanticType, Payload) {
    if text.starts_with("http://") || text.starts_with("https://") {
        return (
            SemanticType::Url,
            Payload::Url {
                url: text.to_string(),
            },
        );
    }
    if let Some(rest) = text.strip_prefix("mailto:") {
        return (SemanticType::Email, parse_mailto(rest));
    }
    if let Some(number) = text.strip_prefix("tel:") {
        return (
            SemanticType::Phone,
            Payload::Phone {
                number: number.to_string(),
            },
        );
    }
    if let Some(rest) = text.strip_prefix("WIFI:") {
        return (SemanticType::Wifi, parse_wifi(rest));
    }
    if text.starts_with("BEGIN:VCARD") {
        return (
            SemanticType::VCard,
            Payload::VCard {
                card: text.to_string(),
            },
        );
    }

    (
        SemanticType::Text,
        Payload::Text {
            text: text.to_string(),
        },
    )
}

/// Parse the body of a `mailto:` URI (prefix already stripped)
fn parse_mailto(content: &str) -> Payload {
    let (address, params) = content.split_once('?').unwrap_or((content, ""));

    let mut subject = None;
    let mut body = None;
    for param in params.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            let value = percent_decode(value);
            match key.to_lowercase().as_str() {
                "subject" => subject = Some(value),
                "body" => body = Some(value),
                _ => {}
            }
        }
    }

    Payload::Email {
        address: percent_decode(address),
        subject,
        body,
    }
}

/// Parse `S:<ssid>;T:<type>;P:<password>;H:<hidden>;;` (prefix stripped)
fn parse_wifi(content: &str) -> Payload {
    let mut ssid = String::new();
    let mut password = None;
    let mut security = WifiSecurity::None;
    let mut hidden = false;

    for field in split_unescaped(content) {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        let value = unescape_wifi(value);
        match key {
            "S" => ssid = value,
            "P" => password = Some(value),
            "T" => security = WifiSecurity::parse(&value),
            "H" => hidden = value.eq_ignore_ascii_case("true"),
            _ => {}
        }
    }

    Payload::Wifi {
        ssid,
        password,
        security,
        hidden,
    }
}

/// Split on `;` that is not preceded by a backslash escape
fn split_unescaped(content: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in content.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ';' if !escaped => {
                fields.push(&content[start..i]);
                start = i + 1;
            }
            _ => escaped = false,
        }
    }
    if start < content.len() {
        fields.push(&content[start..]);
    }
    fields.retain(|f| !f.is_empty());
    fields
}

fn unescape_wifi(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `%XX` escapes and `+` in a URI component
///
/// Invalid escapes are kept literally; invalid UTF-8 is replaced.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match hex_pair(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let digit = |b: u8| (b as char).to_digit(16);
    Some((digit(hi)? * 16 + digit(lo)?) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(text: &str) -> ScanOutcome {
        Classifier::default().classify_text(text)
    }

    #[test]
    fn test_prefix_rules() {
        assert_eq!(outcome("https://example.com").semantic_type, SemanticType::Url);
        assert_eq!(outcome("http://example.com/a").semantic_type, SemanticType::Url);
        assert_eq!(outcome("mailto:a@b.c").semantic_type, SemanticType::Email);
        assert_eq!(outcome("tel:+123").semantic_type, SemanticType::Phone);
        assert_eq!(outcome("WIFI:S:net;;").semantic_type, SemanticType::Wifi);
        assert_eq!(outcome("BEGIN:VCARD\nFN:A\nEND:VCARD").semantic_type, SemanticType::VCard);
        assert_eq!(outcome("example.com").semantic_type, SemanticType::Text);
        // Prefixes are case-sensitive
        assert_eq!(outcome("HTTPS://EXAMPLE.COM").semantic_type, SemanticType::Text);
    }

    #[test]
    fn test_phone_prefix_is_stripped() {
        assert_eq!(
            outcome("tel:+15551234").payload,
            Payload::Phone {
                number: "+15551234".to_string()
            }
        );
    }

    #[test]
    fn test_mailto_query() {
        let payload = outcome("mailto:test@example.com?subject=Hello%20there&body=A+B").payload;
        assert_eq!(
            payload,
            Payload::Email {
                address: "test@example.com".to_string(),
                subject: Some("Hello there".to_string()),
                body: Some("A B".to_string()),
            }
        );
    }

    #[test]
    fn test_wifi_escapes() {
        let payload = outcome(r"WIFI:T:WPA;S:My\;Net;P:pa\:ss\\;H:true;;").payload;
        assert_eq!(
            payload,
            Payload::Wifi {
                ssid: "My;Net".to_string(),
                password: Some(r"pa:ss\".to_string()),
                security: WifiSecurity::Wpa,
                hidden: true,
            }
        );
    }

    #[test]
    fn test_json_identifier() {
        let c = Classifier::default();
        assert_eq!(c.extract_id(r#"{"order_traveler_id": 77}"#), Some(77));
        assert_eq!(c.extract_id(r#"{"orderTravelerId": 12, "x": 1}"#), Some(12));
        assert_eq!(c.extract_id(r#"{"orderTravelerId": "31"}"#), Some(31));
        assert_eq!(c.extract_id(r#"{"order_traveler_id": -4}"#), None);
        assert_eq!(c.extract_id(r#"{"other": 5}"#), None);
    }

    #[test]
    fn test_pattern_identifier() {
        let c = Classifier::default();
        assert_eq!(c.extract_id("order_traveler_id: 77"), Some(77));
        assert_eq!(c.extract_id("ticket orderTravelerId 9 seat 4"), Some(9));
        assert_eq!(c.extract_id("order_traveler_id=77"), None);
    }

    #[test]
    fn test_numeric_text() {
        let o = outcome("  482913 ");
        assert_eq!(o.semantic_type, SemanticType::Text);
        assert_eq!(o.extracted_id, Some(482913));
        assert_eq!(o.raw_text, "  482913 ");

        assert_eq!(outcome("4829 13").extracted_id, None);
        assert_eq!(outcome("99999999999999999999999").extracted_id, None);
    }

    #[test]
    fn test_malformed_input_is_text() {
        for text in ["", "{", r#"{"order_traveler_id": }"#, "%%%", "\u{0}\u{fffd}", "WIFI:"] {
            let o = outcome(text);
            assert_eq!(o.extracted_id, None, "input {:?}", text);
        }
        assert_eq!(outcome("{").semantic_type, SemanticType::Text);
    }

    #[test]
    fn test_percent_decode_edge_cases() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%C3%A9"), "é");
        assert_eq!(percent_decode("%+5"), "%+5");
        assert_eq!(percent_decode("%-1x"), "%-1x");
    }

    #[test]
    fn test_prefix_needs_leading_position() {
        assert_eq!(outcome(" https://x").semantic_type, SemanticType::Text);
        assert_eq!(outcome("\ntel:123").semantic_type, SemanticType::Text);
        assert_eq!(outcome("https://x\n").semantic_type, SemanticType::Url);
    }
}
