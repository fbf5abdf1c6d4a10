//! Wire protocol for the live interview socket
//!
//! Inbound frames are JSON envelopes `{type, ...fields}`. The `type` field is
//! optional and defaults to `text`; any envelope that is not a recognized
//! media/event type but carries a non-empty `text` field is treated as a text
//! turn (legacy clients send bare `{"text": ...}`).
//!
//! Outbound events are serialized with an internal `type` tag.

use crate::models::FinalScore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Envelope could not be parsed at all
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Envelope is not a JSON object")]
    NotAnObject,
}

/// Interview lifecycle signal from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterviewEvent {
    Started,
    Ended,
    Other(String),
}

impl InterviewEvent {
    fn from_wire(event: &str) -> Self {
        match event {
            "interview_started" => InterviewEvent::Started,
            "interview_ended" => InterviewEvent::Ended,
            other => InterviewEvent::Other(other.to_string()),
        }
    }
}

/// Classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Base64 compressed image
    VideoFrame { frame: String },
    /// Base64 self-contained audio segment
    AudioChunk { audio: String },
    /// Typed or transcribed candidate text
    Text { text: String },
    InterviewEvent(InterviewEvent),
    /// Envelope with nothing usable; dropped by the session
    Ignored { kind: String },
}

impl ClientMessage {
    /// Parse and classify one raw frame
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(raw)?;
        let object = value.as_object().ok_or(EnvelopeError::NotAnObject)?;

        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("text")
            .to_string();
        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let message = match kind.as_str() {
            "video_frame" => match field("frame") {
                Some(frame) => ClientMessage::VideoFrame { frame },
                None => ClientMessage::Ignored { kind },
            },
            "audio_chunk" => match field("audio") {
                Some(audio) => ClientMessage::AudioChunk { audio },
                None => ClientMessage::Ignored { kind },
            },
            "interview_event" => match field("event") {
                Some(event) => ClientMessage::InterviewEvent(InterviewEvent::from_wire(&event)),
                None => ClientMessage::Ignored { kind },
            },
            _ => match field("text") {
                Some(text) => ClientMessage::Text { text },
                None => ClientMessage::Ignored { kind },
            },
        };

        Ok(message)
    }
}

/// Who produced a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
}

/// Outbound event sent to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Interviewer dialogue turn
    Text { ai_text: String },

    NonVerbalAnalysis {
        confidence_score: f64,
        emotions: BTreeMap<String, f64>,
        facial_expression: String,
        eye_contact: f64,
        posture_score: f64,
        success: bool,
    },

    AudioAnalysis {
        pitch_hz: f64,
        confidence_score: f64,
        loudness_db: f64,
        speech_rate: f64,
        success: bool,
    },

    /// Recognized candidate speech
    Transcript { text: String, sender: Sender },

    KeywordAnalysis {
        keyword_score: f64,
        top_keywords: Vec<String>,
        success: bool,
    },

    /// Base64 synthesized speech for the preceding `text` turn
    Audio { audio: String },

    FinalScore { scores: FinalScore },

    Status { message: String },
}

impl ServerEvent {
    pub fn status(message: impl Into<String>) -> Self {
        ServerEvent::Status {
            message: message.into(),
        }
    }

    pub fn text(ai_text: impl Into<String>) -> Self {
        ServerEvent::Text {
            ai_text: ai_text.into(),
        }
    }

    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Text { .. } => "text",
            ServerEvent::NonVerbalAnalysis { .. } => "non_verbal_analysis",
            ServerEvent::AudioAnalysis { .. } => "audio_analysis",
            ServerEvent::Transcript { .. } => "transcript",
            ServerEvent::KeywordAnalysis { .. } => "keyword_analysis",
            ServerEvent::Audio { .. } => "audio",
            ServerEvent::FinalScore { .. } => "final_score",
            ServerEvent::Status { .. } => "status",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_frame() {
        let msg = ClientMessage::parse(r#"{"type":"video_frame","frame":"abc"}"#).unwrap();
        assert_eq!(msg, ClientMessage::VideoFrame { frame: "abc".to_string() });
    }

    #[test]
    fn test_video_frame_without_payload_is_ignored() {
        let msg = ClientMessage::parse(r#"{"type":"video_frame"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ignored { kind: "video_frame".to_string() });
    }

    #[test]
    fn test_transcript_and_text_types() {
        let a = ClientMessage::parse(r#"{"type":"transcript","text":"hello"}"#).unwrap();
        let b = ClientMessage::parse(r#"{"type":"text","text":"hello"}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, ClientMessage::Text { text: "hello".to_string() });
    }

    #[test]
    fn test_bare_text_field_is_legacy_text() {
        let msg = ClientMessage::parse(r#"{"text":"I study CSE"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Text { text: "I study CSE".to_string() });
    }

    #[test]
    fn test_unknown_type_with_text_routes_to_text() {
        let msg = ClientMessage::parse(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Text { text: "hi".to_string() });
    }

    #[test]
    fn test_unknown_type_without_text_is_ignored() {
        let msg = ClientMessage::parse(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ignored { kind: "ping".to_string() });
    }

    #[test]
    fn test_interview_events() {
        let started =
            ClientMessage::parse(r#"{"type":"interview_event","event":"interview_started"}"#).unwrap();
        assert_eq!(started, ClientMessage::InterviewEvent(InterviewEvent::Started));

        let ended =
            ClientMessage::parse(r#"{"type":"interview_event","event":"interview_ended"}"#).unwrap();
        assert_eq!(ended, ClientMessage::InterviewEvent(InterviewEvent::Ended));
    }

    #[test]
    fn test_malformed_envelopes() {
        assert!(matches!(
            ClientMessage::parse("{not json"),
            Err(EnvelopeError::InvalidJson(_))
        ));
        assert!(matches!(
            ClientMessage::parse("[1,2,3]"),
            Err(EnvelopeError::NotAnObject)
        ));
    }

    #[test]
    fn test_server_event_serialization() {
        let json = serde_json::to_value(ServerEvent::text("Hello")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["ai_text"], "Hello");

        let json = serde_json::to_value(ServerEvent::Transcript {
            text: "hi".to_string(),
            sender: Sender::User,
        })
        .unwrap();
        assert_eq!(json["type"], "transcript");
        assert_eq!(json["sender"], "user");

        let json = serde_json::to_value(ServerEvent::FinalScore {
            scores: FinalScore {
                non_verbal_score: 85.0,
                vocal_score: 70.0,
                keyword_score: 60.0,
                final_score: 72.0,
            },
        })
        .unwrap();
        assert_eq!(json["type"], "final_score");
        assert_eq!(json["scores"]["final_score"], 72.0);
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let event = ServerEvent::KeywordAnalysis {
            keyword_score: 30.0,
            top_keywords: vec!["api".to_string()],
            success: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
    }
}
