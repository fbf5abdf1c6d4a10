//! Domain models shared between the live service and its store
//!
//! Analysis readings come back from providers wrapped in [`Analysis`], which
//! makes every consumer decide explicitly what to do with a neutral fallback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Where a question came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    Resume,
    Dataset,
}

/// One interview question. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub ideal_answer: String,
    pub source: QuestionSource,
}

/// Candidate answer paired with the question it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub question: String,
    pub ideal_answer: String,
    pub answer: String,
    pub source: QuestionSource,
}

/// Provider reading, tagged by whether it was actually measured
///
/// `Neutral` carries the documented default used when a provider failed or
/// had nothing to analyze. Neutral readings are reported to the client with
/// `success: false` and never feed score channels.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis<T> {
    Measured(T),
    Neutral(T),
}

impl<T> Analysis<T> {
    pub fn is_measured(&self) -> bool {
        matches!(self, Analysis::Measured(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Analysis::Measured(v) | Analysis::Neutral(v) => v,
        }
    }

    /// The reading if it was measured
    pub fn measured(&self) -> Option<&T> {
        match self {
            Analysis::Measured(v) => Some(v),
            Analysis::Neutral(_) => None,
        }
    }
}

impl<T: NeutralDefault> Analysis<T> {
    /// Collapse a provider result, substituting the neutral default on error
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>, context: &str) -> Self {
        match result {
            Ok(v) => Analysis::Measured(v),
            Err(e) => {
                tracing::warn!("{} failed, using neutral default: {}", context, e);
                Analysis::Neutral(T::neutral())
            }
        }
    }
}

/// Documented fallback value for a reading type
pub trait NeutralDefault {
    fn neutral() -> Self;
}

/// Single video frame reading
///
/// `confidence` is on the 0-100 scale; `eye_contact` and `posture_score` are
/// 0-1; emotion probabilities are 0-1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    pub emotions: BTreeMap<String, f64>,
    pub dominant_expression: String,
    pub eye_contact: f64,
    pub posture_score: f64,
    pub confidence: f64,
}

impl NeutralDefault for VideoResult {
    fn neutral() -> Self {
        Self {
            emotions: BTreeMap::new(),
            dominant_expression: "none".to_string(),
            eye_contact: 0.0,
            posture_score: 0.0,
            confidence: 0.0,
        }
    }
}

/// Single audio chunk reading. `confidence` is 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocalResult {
    pub pitch_hz: f64,
    pub loudness_db: f64,
    pub stability: f64,
    pub speech_rate: f64,
    pub confidence: f64,
}

/// Loudness reported for silence or undecodable audio
pub const SILENCE_FLOOR_DB: f64 = -80.0;

impl NeutralDefault for VocalResult {
    fn neutral() -> Self {
        Self {
            pitch_hz: 0.0,
            loudness_db: SILENCE_FLOOR_DB,
            stability: 0.0,
            speech_rate: 0.0,
            confidence: 0.0,
        }
    }
}

/// Keyword coverage of a transcript against a branch's vocabulary. `score` is 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordResult {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub score: f64,
}

impl NeutralDefault for KeywordResult {
    fn neutral() -> Self {
        Self {
            matched: Vec::new(),
            missing: Vec::new(),
            score: 0.0,
        }
    }
}

/// Final live composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub non_verbal_score: f64,
    pub vocal_score: f64,
    pub keyword_score: f64,
    pub final_score: f64,
}

/// Registered candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: String,
    pub name: String,
    pub email: String,
    pub branch: String,
    #[serde(default)]
    pub resume_text: String,
    pub created_at: DateTime<Utc>,
}

/// Candidate registration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCandidate {
    pub name: String,
    pub email: String,
    pub branch: String,
    #[serde(default)]
    pub resume_text: String,
}

/// Completed interview as handed to the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Freshly generated at end of interview
    pub session_id: Uuid,
    /// Live connection that produced the record
    pub connection_id: Uuid,
    pub candidate_id: Option<String>,
    pub branch: Option<String>,
    /// Every candidate utterance, joined in order
    pub transcript: String,
    pub answers: Vec<AnswerRecord>,
    pub scores: FinalScore,
    pub saved_at: DateTime<Utc>,
}

/// Row in the session listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub candidate_id: Option<String>,
    pub branch: Option<String>,
    pub final_score: f64,
    pub saved_at: DateTime<Utc>,
}

/// Round to one decimal place, as scores are reported
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
