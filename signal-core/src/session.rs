//! Guided verification session state.
//!
//! An agent walks a customer through a fixed questionnaire, requests face and
//! ID photos, and finally hands over a call identifier so both sides can join
//! the same externally hosted video call. Both sides are modelled here as
//! plain reducers: feed them [`Forwarded`] envelopes, get back
//! [`SessionEvent`]s; ask them for [`Outbound`] messages to send.
//!
//! Nothing in this module touches the network.

use serde_json::{json, Value};
use signal_types::{
    CallRendezvous, CapturedImage, Forwarded, MessageKind, ParticipantName, QuestionPayload,
    ResponsePayload,
};
use std::collections::BTreeMap;

/// Questions asked when no custom list is supplied.
pub const DEFAULT_QUESTIONS: [&str; 4] = [
    "What is your full name?",
    "What is your date of birth?",
    "What is your address?",
    "Please show your ID to the camera.",
];

/// Which photo is being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaptureKind {
    /// Customer's face.
    Face,
    /// Customer's identity document.
    Id,
}

impl CaptureKind {
    /// Message telling the customer to get ready.
    pub fn ready_kind(self) -> MessageKind {
        match self {
            Self::Face => MessageKind::PhotoReady,
            Self::Id => MessageKind::IdReady,
        }
    }

    /// Message triggering the capture.
    pub fn capture_kind(self) -> MessageKind {
        match self {
            Self::Face => MessageKind::PhotoCapture,
            Self::Id => MessageKind::IdCapture,
        }
    }

    /// Message carrying the captured image back.
    pub fn captured_kind(self) -> MessageKind {
        match self {
            Self::Face => MessageKind::FaceCaptured,
            Self::Id => MessageKind::IdCaptured,
        }
    }
}

/// A message an endpoint should send to its peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// Envelope `type`.
    pub kind: MessageKind,
    /// Envelope payload.
    pub payload: Value,
}

impl Outbound {
    fn new(kind: MessageKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    fn bare(kind: MessageKind) -> Self {
        Self::new(kind, json!({}))
    }
}

/// Questionnaire progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Index of the question currently shown.
    pub current: usize,
    /// Number of questions.
    pub total: usize,
    /// Number of questions with a recorded response.
    pub answered: usize,
}

/// Something that happened as a result of an inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The agent opened the questionnaire.
    QuestionsStarted,
    /// A question is now shown.
    QuestionAsked {
        /// Position in the known question list, if it is in it.
        index: Option<usize>,
        /// Question text.
        question: String,
    },
    /// A response was recorded.
    ResponseRecorded {
        /// Question text.
        question: String,
        /// Answer.
        response: String,
    },
    /// The customer should get ready for a capture.
    CaptureReady(CaptureKind),
    /// The customer must capture now and reply to `reply_to`.
    CaptureRequested {
        /// Which photo.
        kind: CaptureKind,
        /// Who asked (reply goes there).
        reply_to: ParticipantName,
    },
    /// The agent received a captured image.
    ImageCaptured {
        /// Which photo.
        kind: CaptureKind,
        /// Data URL, if the customer could produce one.
        image_data: Option<String>,
    },
    /// The peer handed over a call identifier.
    CallRequested {
        /// Identifier to join.
        group_id: String,
    },
    /// The envelope was not meaningful to this side (or its payload was malformed).
    Ignored {
        /// The envelope's `type`.
        kind: String,
    },
}

fn ignored(envelope: &Forwarded) -> Vec<SessionEvent> {
    vec![SessionEvent::Ignored {
        kind: envelope.kind.clone(),
    }]
}

/// The agent side of a verification session.
#[derive(Debug, Clone)]
pub struct AgentSession {
    questions: Vec<String>,
    current: usize,
    started: bool,
    responses: BTreeMap<String, String>,
    images: BTreeMap<CaptureKind, Option<String>>,
    call_group: Option<String>,
}

impl AgentSession {
    /// Create a session over the given questions.
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions,
            current: 0,
            started: false,
            responses: BTreeMap::new(),
            images: BTreeMap::new(),
            call_group: None,
        }
    }

    /// Create a session over [`DEFAULT_QUESTIONS`].
    pub fn with_default_questions() -> Self {
        Self::new(DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect())
    }

    /// Open the questionnaire and ask the first question.
    pub fn start_questions(&mut self) -> Vec<Outbound> {
        self.started = true;
        self.current = 0;
        let mut out = vec![Outbound::bare(MessageKind::QuestionStarted)];
        out.extend(self.ask(0));
        out
    }

    /// Ask question `index`. `None` if out of range.
    pub fn ask(&mut self, index: usize) -> Option<Outbound> {
        let question = self.questions.get(index)?.clone();
        self.current = index;
        Some(Outbound::new(
            MessageKind::Question,
            json!(QuestionPayload { question }),
        ))
    }

    /// Advance to the next question. `None` after the last one.
    pub fn next_question(&mut self) -> Option<Outbound> {
        self.ask(self.current + 1)
    }

    /// Record an answer and share it with the customer.
    pub fn submit_response(&mut self, question: &str, response: &str) -> Outbound {
        self.responses
            .insert(question.to_string(), response.to_string());
        Outbound::new(
            MessageKind::SubmitResponse,
            json!(ResponsePayload {
                question: question.to_string(),
                response: response.to_string(),
            }),
        )
    }

    /// Messages requesting a capture: the ready notice, then the trigger.
    ///
    /// The endpoint decides how long to wait between the two.
    pub fn request_capture(&self, kind: CaptureKind) -> [Outbound; 2] {
        [
            Outbound::bare(kind.ready_kind()),
            Outbound::bare(kind.capture_kind()),
        ]
    }

    /// Hand the call identifier to the customer.
    pub fn initiate_call(&mut self, group_id: &str) -> Outbound {
        self.call_group = Some(group_id.to_string());
        Outbound::new(
            MessageKind::InitiateCall,
            json!(CallRendezvous {
                group_id: group_id.to_string(),
            }),
        )
    }

    /// Apply an envelope received from the customer.
    pub fn on_envelope(&mut self, envelope: &Forwarded) -> Vec<SessionEvent> {
        match MessageKind::from(envelope.kind.as_str()) {
            MessageKind::FaceCaptured | MessageKind::IdCaptured => {
                let kind = if envelope.kind == MessageKind::FaceCaptured.as_str() {
                    CaptureKind::Face
                } else {
                    CaptureKind::Id
                };
                let image_data = envelope
                    .decode_payload::<CapturedImage>()
                    .and_then(|img| img.image_data);
                self.images.insert(kind, image_data.clone());
                vec![SessionEvent::ImageCaptured { kind, image_data }]
            }
            MessageKind::Response => match envelope.decode_payload::<ResponsePayload>() {
                Some(r) => {
                    self.responses.insert(r.question.clone(), r.response.clone());
                    vec![SessionEvent::ResponseRecorded {
                        question: r.question,
                        response: r.response,
                    }]
                }
                None => ignored(envelope),
            },
            _ => ignored(envelope),
        }
    }

    /// Whether the questionnaire has been opened.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Current progress.
    pub fn progress(&self) -> Progress {
        Progress {
            current: self.current,
            total: self.questions.len(),
            answered: self
                .questions
                .iter()
                .filter(|q| self.responses.contains_key(*q))
                .count(),
        }
    }

    /// Whether every question has a response.
    pub fn all_answered(&self) -> bool {
        self.questions.iter().all(|q| self.responses.contains_key(q))
    }

    /// Recorded responses keyed by question.
    pub fn responses(&self) -> &BTreeMap<String, String> {
        &self.responses
    }

    /// Captured image of `kind`: `None` if never received, `Some(None)` if
    /// the customer replied without data.
    pub fn image(&self, kind: CaptureKind) -> Option<Option<&str>> {
        self.images.get(&kind).map(|img| img.as_deref())
    }

    /// Call identifier handed over, if any.
    pub fn call_group(&self) -> Option<&str> {
        self.call_group.as_deref()
    }
}

/// The customer side of a verification session.
#[derive(Debug, Clone)]
pub struct CustomerSession {
    questions: Vec<String>,
    started: bool,
    question: Option<String>,
    current: usize,
    responses: BTreeMap<String, String>,
    pending_capture: Option<CaptureKind>,
    call_group: Option<String>,
}

impl CustomerSession {
    /// Create a session that knows the agent's question list (for progress).
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions,
            started: false,
            question: None,
            current: 0,
            responses: BTreeMap::new(),
            pending_capture: None,
            call_group: None,
        }
    }

    /// Create a session over [`DEFAULT_QUESTIONS`].
    pub fn with_default_questions() -> Self {
        Self::new(DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect())
    }

    /// Apply an envelope received from the agent.
    pub fn on_envelope(&mut self, envelope: &Forwarded) -> Vec<SessionEvent> {
        match MessageKind::from(envelope.kind.as_str()) {
            MessageKind::QuestionStarted => {
                self.started = true;
                vec![SessionEvent::QuestionsStarted]
            }
            MessageKind::Question => {
                let question = envelope
                    .decode_payload::<QuestionPayload>()
                    .map(|q| q.question)
                    .unwrap_or_default();
                let index = self.questions.iter().position(|q| *q == question);
                // Unknown questions are shown at the first position
                self.current = index.unwrap_or(0);
                self.question = Some(question.clone());
                vec![SessionEvent::QuestionAsked { index, question }]
            }
            MessageKind::SubmitResponse => match envelope.decode_payload::<ResponsePayload>() {
                Some(r) => {
                    self.responses.insert(r.question.clone(), r.response.clone());
                    vec![SessionEvent::ResponseRecorded {
                        question: r.question,
                        response: r.response,
                    }]
                }
                None => ignored(envelope),
            },
            MessageKind::PhotoReady => self.ready(CaptureKind::Face),
            MessageKind::IdReady => self.ready(CaptureKind::Id),
            MessageKind::PhotoCapture => self.capture(CaptureKind::Face, envelope),
            MessageKind::IdCapture => self.capture(CaptureKind::Id, envelope),
            MessageKind::InitiateCall => match envelope.decode_payload::<CallRendezvous>() {
                Some(call) => {
                    self.call_group = Some(call.group_id.clone());
                    vec![SessionEvent::CallRequested {
                        group_id: call.group_id,
                    }]
                }
                None => ignored(envelope),
            },
            _ => ignored(envelope),
        }
    }

    fn ready(&mut self, kind: CaptureKind) -> Vec<SessionEvent> {
        self.pending_capture = Some(kind);
        vec![SessionEvent::CaptureReady(kind)]
    }

    fn capture(&self, kind: CaptureKind, envelope: &Forwarded) -> Vec<SessionEvent> {
        vec![SessionEvent::CaptureRequested {
            kind,
            reply_to: envelope.from.clone(),
        }]
    }

    /// Build the reply carrying a captured image and clear the overlay.
    pub fn captured(&mut self, kind: CaptureKind, image_data: Option<String>) -> Outbound {
        self.pending_capture = None;
        Outbound::new(kind.captured_kind(), json!(CapturedImage { image_data }))
    }

    /// Build a free-text answer to `question`.
    pub fn respond(&self, question: &str, response: &str) -> Outbound {
        Outbound::new(
            MessageKind::Response,
            json!(ResponsePayload {
                question: question.to_string(),
                response: response.to_string(),
            }),
        )
    }

    /// Whether the agent opened the questionnaire.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Question currently shown.
    pub fn current_question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    /// Capture the customer is getting ready for.
    pub fn pending_capture(&self) -> Option<CaptureKind> {
        self.pending_capture
    }

    /// Call identifier received from the agent.
    pub fn call_group(&self) -> Option<&str> {
        self.call_group.as_deref()
    }

    /// Responses the agent recorded, keyed by question.
    pub fn responses(&self) -> &BTreeMap<String, String> {
        &self.responses
    }

    /// Current progress.
    pub fn progress(&self) -> Progress {
        Progress {
            current: self.current,
            total: self.questions.len(),
            answered: self
                .questions
                .iter()
                .filter(|q| self.responses.contains_key(*q))
                .count(),
        }
    }
}
