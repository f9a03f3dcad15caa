//! Challenge protocol codec.
//!
//! The handshake and failure paths exchange small JSON text frames:
//! control frames `{status, data?}` while the connection is live, and
//! `(status, message)` pairs carried on the close frame when it is not.
//! Application status codes sit in the RFC 6455 private range
//! (4000-4999); the two transport codes below are standard.

use serde::{Deserialize, Serialize};

// Challenge responses.

/// Challenge passed.
pub const CHALLENGE_SUCCESS: u16 = 4000;

/// The server expects the next client message to contain a password.
pub const CHALLENGE_PASSWORD: u16 = 4001;

// Informational.

/// No error occurred in the last message.
pub const OK: u16 = 4200;

// Application errors.

/// Malformed message data received.
pub const BAD_MSG: u16 = 4400;

/// Invalid login attempt.
pub const UNAUTHORISED: u16 = 4401;

/// Permission denied.
pub const FORBIDDEN: u16 = 4402;

/// Object not found.
pub const NOT_FOUND: u16 = 4403;

/// Took too long responding.
pub const TIMEOUT: u16 = 4404;

/// The producer slot is taken or the subscriber set is at capacity.
pub const CHANNEL_FULL: u16 = 4405;

// Transport codes (RFC 6455 section 7.4.1).

/// The server is discarding the connection, e.g. its channel was deleted.
pub const GOING_AWAY: u16 = 1001;

/// Non-text data or another protocol breach.
pub const POLICY_VIOLATION: u16 = 1008;

/// Unclassified server-side failure.
pub const INTERNAL_ERROR: u16 = 1011;

/// Control frame exchanged while the connection is live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ControlFrame {
    pub fn challenge_password() -> Self {
        Self {
            status: CHALLENGE_PASSWORD,
            data: None,
        }
    }

    pub fn challenge_success() -> Self {
        Self {
            status: CHALLENGE_SUCCESS,
            data: None,
        }
    }

    pub fn data(data: serde_json::Value) -> Self {
        Self {
            status: OK,
            data: Some(data),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

/// Error frame: the status and reason conveyed on a failure close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub status: u16,
    pub message: String,
}

impl ErrorFrame {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_frame_round_trips() {
        let frame = ControlFrame::challenge_password();
        let encoded = frame.encode().unwrap();
        assert_eq!(encoded, r#"{"status":4001}"#);

        let decoded = ControlFrame::decode(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn data_frame_round_trips() {
        let frame = ControlFrame::data(serde_json::json!({"lap": 3}));
        let decoded = ControlFrame::decode(frame.encode().unwrap().as_bytes()).unwrap();
        assert_eq!(decoded.status, OK);
        assert_eq!(decoded.data.unwrap()["lap"], 3);
    }

    #[test]
    fn error_frame_round_trips() {
        let frame = ErrorFrame::new(UNAUTHORISED, "incorrect password");
        let decoded = ErrorFrame::decode(frame.encode().unwrap().as_bytes()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn absent_data_is_omitted_from_the_wire() {
        let encoded = ControlFrame::challenge_success().encode().unwrap();
        assert!(!encoded.contains("data"));
    }
}
