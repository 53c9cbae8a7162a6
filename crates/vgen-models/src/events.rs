//! Push-channel event types.
//!
//! Each event travels as a server-sent event whose `event:` name is
//! [`JobEventType::as_str`] and whose `data:` line is the JSON payload
//! produced by serializing the [`JobEvent`] itself.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Event names on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobEventType {
    /// Progress update
    Progress,
    /// Output ready for download
    Complete,
    /// Job failed
    Error,
}

impl JobEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventType::Progress => "progress",
            JobEventType::Complete => "complete",
            JobEventType::Error => "error",
        }
    }
}

/// Event payload. Serialized without a tag; the tag is the SSE event name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum JobEvent {
    /// Progress update (0-100)
    Progress { percent: u8, status: String },

    /// Output is ready at `url`
    Complete { url: String, name: String },

    /// Job failed
    Error { error: String },
}

impl JobEvent {
    /// Create a progress event. Percent is capped at 100.
    pub fn progress(percent: u8, status: impl Into<String>) -> Self {
        JobEvent::Progress {
            percent: percent.min(100),
            status: status.into(),
        }
    }

    /// Create a completion event.
    pub fn complete(url: impl Into<String>, name: impl Into<String>) -> Self {
        JobEvent::Complete {
            url: url.into(),
            name: name.into(),
        }
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        JobEvent::Error {
            error: message.into(),
        }
    }

    pub fn event_type(&self) -> JobEventType {
        match self {
            JobEvent::Progress { .. } => JobEventType::Progress,
            JobEvent::Complete { .. } => JobEventType::Complete,
            JobEvent::Error { .. } => JobEventType::Error,
        }
    }

    /// Whether this event ends the channel.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_payload() {
        let json = serde_json::to_string(&JobEvent::progress(42, "Rendering...")).unwrap();
        assert_eq!(json, r#"{"percent":42,"status":"Rendering..."}"#);
    }

    #[test]
    fn test_progress_capped() {
        match JobEvent::progress(250, "x") {
            JobEvent::Progress { percent, .. } => assert_eq!(percent, 100),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_complete_and_error_payloads() {
        let json = serde_json::to_string(&JobEvent::complete("http://h/download/v.mp4", "v.mp4"))
            .unwrap();
        assert_eq!(json, r#"{"url":"http://h/download/v.mp4","name":"v.mp4"}"#);

        let json = serde_json::to_string(&JobEvent::error("boom")).unwrap();
        assert_eq!(json, r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!JobEvent::progress(1, "a").is_terminal());
        assert!(JobEvent::complete("u", "n").is_terminal());
        assert!(JobEvent::error("e").is_terminal());
        assert_eq!(JobEvent::error("e").event_type().as_str(), "error");
    }
}
