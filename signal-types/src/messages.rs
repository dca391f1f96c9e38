//! Application messages exchanged between the agent and customer endpoints.
//!
//! The relay routes on `to` only and never interprets these. They exist so
//! endpoints agree on the vocabulary and payload shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message `type` values used by a guided verification session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Agent opened the questionnaire
    QuestionStarted,
    /// Agent asks a question
    Question,
    /// Agent records the answer to a question
    SubmitResponse,
    /// Customer answers a question
    Response,
    /// Agent asks the customer to get ready for a face photo
    PhotoReady,
    /// Agent triggers the face photo
    PhotoCapture,
    /// Agent asks the customer to get ready for an ID photo
    IdReady,
    /// Agent triggers the ID photo
    IdCapture,
    /// Customer sends the face photo
    FaceCaptured,
    /// Customer sends the ID photo
    IdCaptured,
    /// Agent hands over the call rendezvous identifier
    InitiateCall,
    /// Anything else; routed like every other type
    Other(String),
}

impl MessageKind {
    /// The wire string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::QuestionStarted => "question_started",
            Self::Question => "question",
            Self::SubmitResponse => "submit_response",
            Self::Response => "response",
            Self::PhotoReady => "photo_ready",
            Self::PhotoCapture => "photo_capture",
            Self::IdReady => "id_ready",
            Self::IdCapture => "id_capture",
            Self::FaceCaptured => "face_captured",
            Self::IdCaptured => "id_captured",
            Self::InitiateCall => "initiate_call",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for MessageKind {
    fn from(value: &str) -> Self {
        match value {
            "question_started" => Self::QuestionStarted,
            "question" => Self::Question,
            "submit_response" => Self::SubmitResponse,
            "response" => Self::Response,
            "photo_ready" => Self::PhotoReady,
            "photo_capture" => Self::PhotoCapture,
            "id_ready" => Self::IdReady,
            "id_capture" => Self::IdCapture,
            "face_captured" => Self::FaceCaptured,
            "id_captured" => Self::IdCaptured,
            "initiate_call" => Self::InitiateCall,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `question`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPayload {
    /// Question text.
    pub question: String,
}

/// Payload of `submit_response` and `response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Question text the answer belongs to.
    pub question: String,
    /// Free-text answer.
    pub response: String,
}

/// Payload of `face_captured` and `id_captured`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedImage {
    /// Image as a data URL (`data:image/jpeg;base64,...`).
    #[serde(rename = "imageData")]
    pub image_data: Option<String>,
}

/// Payload of `initiate_call`: the identifier both sides join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRendezvous {
    /// Group call identifier understood by the calling SDK.
    #[serde(rename = "groupId")]
    pub group_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_strings_are_stable() {
        let all = [
            "question_started",
            "question",
            "submit_response",
            "response",
            "photo_ready",
            "photo_capture",
            "id_ready",
            "id_capture",
            "face_captured",
            "id_captured",
            "initiate_call",
        ];
        for s in all {
            let kind = MessageKind::from(s);
            assert!(!matches!(kind, MessageKind::Other(_)), "{s} is well-known");
            assert_eq!(kind.as_str(), s);
        }
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind = MessageKind::from("custom_event");
        assert_eq!(kind, MessageKind::Other("custom_event".to_string()));
        assert_eq!(kind.to_string(), "custom_event");
    }

    #[test]
    fn payload_field_names_match_browser_clients() {
        let img: CapturedImage =
            serde_json::from_value(json!({"imageData": "data:image/jpeg;base64,AA"})).unwrap();
        assert_eq!(img.image_data.as_deref(), Some("data:image/jpeg;base64,AA"));

        let call = CallRendezvous {
            group_id: "g-123".to_string(),
        };
        assert_eq!(serde_json::to_value(&call).unwrap(), json!({"groupId": "g-123"}));
    }

    #[test]
    fn captured_image_tolerates_missing_data() {
        let img: CapturedImage = serde_json::from_value(json!({})).unwrap();
        assert_eq!(img.image_data, None);
    }
}
