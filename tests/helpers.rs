//! Shared helpers for integration tests

#![allow(dead_code)]

use plumber::Response;

/// Wrap a payload in one native-messaging frame (u32 LE length prefix).
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut bytes = (payload.len() as u32).to_le_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// Build a framed envelope the way the extension sends one.
pub fn envelope_frame(url: &str, html: Option<&str>) -> Vec<u8> {
    let mut value = serde_json::json!({
        "id": "msg-1",
        "origin": "test",
        "url": url,
        "target": "",
        "timestamp": 1679800000u64,
    });
    if let Some(html) = html {
        value["html"] = serde_json::Value::String(html.to_string());
    }
    frame(&serde_json::to_vec(&value).unwrap())
}

/// Decode every response frame the loop wrote.
pub fn decode_responses(mut bytes: &[u8]) -> Vec<Response> {
    let mut responses = Vec::new();
    while bytes.len() >= 4 {
        let len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        let payload = &bytes[4..4 + len];
        responses.push(serde_json::from_slice(payload).unwrap());
        bytes = &bytes[4 + len..];
    }
    responses
}
