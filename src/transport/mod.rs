//! Native-messaging transport: framing, message types, and the run loop

pub mod dispatcher;
pub mod frame;

use serde::{Deserialize, Serialize};

pub use dispatcher::run_loop;
pub use frame::{FrameCodec, FrameError, DEFAULT_MAX_FRAME_LEN};

/// Inbound message from the extension
///
/// Only `url` and `html` are consumed; `target` is accepted for future
/// direct routing and currently only logged. Fields default so partial
/// envelopes still decode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub id: String,
    pub origin: String,
    pub url: String,
    pub target: String,
    pub timestamp: i64,
    pub html: Option<String>,
}

/// Outbound message status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Outbound response, exactly one per decoded envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub message: String,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_envelope_decodes_with_defaults() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(envelope.url, "https://example.com");
        assert!(envelope.origin.is_empty());
        assert_eq!(envelope.timestamp, 0);
        assert!(envelope.html.is_none());
    }

    #[test]
    fn response_status_serializes_lowercase() {
        let json = serde_json::to_string(&Response::success("done")).unwrap();
        assert!(json.contains(r#""status":"success""#));
        let json = serde_json::to_string(&Response::error("boom")).unwrap();
        assert!(json.contains(r#""status":"error""#));
    }
}
