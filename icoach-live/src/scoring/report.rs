//! Offline report score
//!
//! Compiled after the interview from a persisted session, separately from the
//! live composite:
//! - content = semantic similarity × 0.65 + keyword coverage × 0.35
//! - presentation = vocal confidence × 0.55 + non-verbal × 0.45
//! - total = content + presentation, out of 200
//!
//! Every input is capped to 0-100 before weighting.

use crate::providers::SemanticScorer;
use icoach_common::models::{round1, SessionRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

pub const REPORT_MAX_SCORE: f64 = 200.0;

const STRONG_HIRE_THRESHOLD: f64 = 150.0;
const CONSIDER_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportInputs {
    pub semantic_similarity: f64,
    pub keyword_coverage: f64,
    pub vocal_confidence: f64,
    pub non_verbal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Strong Hire")]
    StrongHire,
    #[serde(rename = "Consider")]
    Consider,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportScore {
    pub content_score: f64,
    pub presentation_score: f64,
    pub total_score: f64,
    pub max_score: f64,
    pub verdict: Verdict,
}

fn cap(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn compile(inputs: &ReportInputs) -> ReportScore {
    let content = cap(inputs.semantic_similarity) * 0.65 + cap(inputs.keyword_coverage) * 0.35;
    let presentation = cap(inputs.vocal_confidence) * 0.55 + cap(inputs.non_verbal) * 0.45;
    let total = content + presentation;

    let verdict = if total >= STRONG_HIRE_THRESHOLD {
        Verdict::StrongHire
    } else if total >= CONSIDER_THRESHOLD {
        Verdict::Consider
    } else {
        Verdict::NeedsImprovement
    };

    ReportScore {
        content_score: round1(content),
        presentation_score: round1(presentation),
        total_score: round1(total),
        max_score: REPORT_MAX_SCORE,
        verdict,
    }
}

/// One answered question with its similarity to the ideal answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReview {
    pub question: String,
    pub answer: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub candidate_id: Option<String>,
    pub branch: Option<String>,
    pub answers: Vec<AnswerReview>,
    pub inputs: ReportInputs,
    pub score: ReportScore,
}

/// Build the report for a persisted session
///
/// Blocks on the semantic scorer; run it on the worker pool. Answers whose
/// question has no ideal answer, or whose scoring fails, count as 0.
pub fn build_report(record: &SessionRecord, semantic: &dyn SemanticScorer) -> SessionReport {
    let answers: Vec<AnswerReview> = record
        .answers
        .iter()
        .map(|answer| {
            let similarity = if answer.ideal_answer.trim().is_empty() {
                0.0
            } else {
                semantic
                    .similarity(&answer.answer, &answer.ideal_answer)
                    .unwrap_or_else(|e| {
                        warn!(question_id = %answer.question_id, "Similarity scoring failed: {}", e);
                        0.0
                    })
            };
            AnswerReview {
                question: answer.question.clone(),
                answer: answer.answer.clone(),
                similarity: round1(similarity),
            }
        })
        .collect();

    let semantic_similarity = if answers.is_empty() {
        0.0
    } else {
        answers.iter().map(|a| a.similarity).sum::<f64>() / answers.len() as f64
    };

    let inputs = ReportInputs {
        semantic_similarity,
        keyword_coverage: record.scores.keyword_score,
        vocal_confidence: record.scores.vocal_score,
        non_verbal: record.scores.non_verbal_score,
    };

    SessionReport {
        session_id: record.session_id,
        candidate_id: record.candidate_id.clone(),
        branch: record.branch.clone(),
        answers,
        score: compile(&inputs),
        inputs,
    }
}
