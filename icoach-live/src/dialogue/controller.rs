//! Interview dialogue state machine
//!
//! Stages only move forward:
//! ```text
//! Introduction ──any──> BranchSelection ──branch resolved──> Interview ──questions exhausted──> Feedback
//!                           │   ▲                              │   ▲                              │   ▲
//!                           └───┘ unresolved: reprompt         └───┘ next question                └───┘ closing remark
//! ```
//!
//! Questions come from the résumé first (up to the quota, while the
//! generator succeeds), then from the branch dataset in order.
//!
//! A controller belongs to one session. Its provider calls block, so the
//! session drives it from the worker pool, one turn at a time.

use super::branch::resolve_branch;
use crate::providers::{BranchClassifier, Probe, Providers, QuestionGenerator, QuestionProvider};
use icoach_common::models::{AnswerRecord, Question, QuestionSource};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fixed remark once no questions remain
pub const CLOSING_MESSAGE: &str = "That concludes the technical round. Thank you for your time!";

/// Longest résumé excerpt handed to the generator
const RESUME_EXCERPT_CHARS: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Introduction,
    BranchSelection,
    Interview,
    Feedback,
}

pub struct DialogueController {
    stage: Stage,
    known_branches: Vec<String>,
    selected_branch: Option<String>,
    questions_list: Vec<Question>,
    dataset_cursor: usize,
    resume_text: Option<String>,
    resume_questions_asked: usize,
    resume_quota: usize,
    current_question: Option<Question>,
    answers: Vec<AnswerRecord>,
    questions: Arc<dyn QuestionProvider>,
    classifier: Arc<dyn BranchClassifier>,
    generator: Arc<dyn QuestionGenerator>,
}

impl DialogueController {
    /// Blank or whitespace-only résumé text counts as no résumé
    pub fn new(providers: &Providers, resume_text: Option<String>, resume_quota: usize) -> Self {
        Self {
            stage: Stage::Introduction,
            known_branches: providers.questions.branches(),
            selected_branch: None,
            questions_list: Vec::new(),
            dataset_cursor: 0,
            resume_text: resume_text.filter(|text| !text.trim().is_empty()),
            resume_questions_asked: 0,
            resume_quota,
            current_question: None,
            answers: Vec::new(),
            questions: Arc::clone(&providers.questions),
            classifier: Arc::clone(&providers.classifier),
            generator: Arc::clone(&providers.generator),
        }
    }

    /// Produce the interviewer's next turn for one candidate input
    pub fn respond(&mut self, input: &str) -> String {
        match self.stage {
            Stage::Introduction => {
                self.advance(Stage::BranchSelection);
                format!(
                    "Hello! Welcome to your technical interview. Which engineering branch are you from? Options: {}.",
                    self.branch_options()
                )
            }
            Stage::BranchSelection => self.select_branch(input),
            Stage::Interview => {
                self.record_answer(input);
                self.next_question()
            }
            Stage::Feedback => CLOSING_MESSAGE.to_string(),
        }
    }

    fn select_branch(&mut self, input: &str) -> String {
        let Some(branch) = resolve_branch(input, &self.known_branches, self.classifier.as_ref()) else {
            return format!(
                "I didn't catch your branch. Please choose one of: {}.",
                self.branch_options()
            );
        };

        self.questions_list = match self.questions.questions(&branch) {
            Ok(list) => list,
            Err(e) => {
                warn!(branch = %branch, "Question fetch failed, continuing without dataset questions: {}", e);
                Vec::new()
            }
        };
        info!(branch = %branch, questions = self.questions_list.len(), "Branch selected");

        self.selected_branch = Some(branch.clone());
        self.advance(Stage::Interview);
        format!("Great, let's begin your {} interview.\n\n{}", branch, self.next_question())
    }

    fn record_answer(&mut self, input: &str) {
        let Some(question) = self.current_question.take() else {
            return;
        };
        self.answers.push(AnswerRecord {
            question_id: question.id,
            question: question.text,
            ideal_answer: question.ideal_answer,
            answer: input.trim().to_string(),
            source: question.source,
        });
    }

    /// Serve the next question under the hybrid policy
    ///
    /// A failed résumé generation falls through to the dataset for this turn
    /// only and does not use up quota.
    pub fn next_question(&mut self) -> String {
        if self.stage == Stage::Feedback {
            return CLOSING_MESSAGE.to_string();
        }

        if let Some(question) = self.resume_question() {
            let text = format!("(Resume Question) {}", question.text);
            self.current_question = Some(question);
            return text;
        }

        if self.dataset_cursor < self.questions_list.len() {
            let question = self.questions_list[self.dataset_cursor].clone();
            self.dataset_cursor += 1;
            let number = self.dataset_cursor + self.resume_questions_asked;
            let text = format!("Question {}: {}", number, question.text);
            self.current_question = Some(question);
            return text;
        }

        self.current_question = None;
        self.advance(Stage::Feedback);
        CLOSING_MESSAGE.to_string()
    }

    fn resume_question(&mut self) -> Option<Question> {
        if self.resume_questions_asked >= self.resume_quota {
            return None;
        }
        let excerpt = resume_excerpt(self.resume_text.as_deref()?, self.resume_questions_asked);

        match self.generator.generate(&excerpt) {
            Ok(generated) => {
                self.resume_questions_asked += 1;
                debug!(asked = self.resume_questions_asked, quota = self.resume_quota, "Résumé question generated");
                Some(Question {
                    id: format!("resume-{}", self.resume_questions_asked),
                    text: generated.text,
                    ideal_answer: generated.ideal_answer,
                    source: QuestionSource::Resume,
                })
            }
            Err(e) => {
                warn!(generator = self.generator.name(), "Résumé question failed, using dataset: {}", e);
                None
            }
        }
    }

    fn advance(&mut self, next: Stage) {
        if next > self.stage {
            debug!(from = ?self.stage, to = ?next, "Dialogue stage advanced");
            self.stage = next;
        }
    }

    fn branch_options(&self) -> String {
        self.known_branches.join(", ")
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn selected_branch(&self) -> Option<&str> {
        self.selected_branch.as_deref()
    }

    pub fn dataset_cursor(&self) -> usize {
        self.dataset_cursor
    }

    pub fn question_count(&self) -> usize {
        self.questions_list.len()
    }

    pub fn resume_questions_asked(&self) -> usize {
        self.resume_questions_asked
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn known_branches(&self) -> &[String] {
        &self.known_branches
    }
}

/// Pick a different slice of the résumé for each question
///
/// Paragraphs (blank-line separated) rotate with `index`; each is capped at
/// [`RESUME_EXCERPT_CHARS`].
fn resume_excerpt(resume: &str, index: usize) -> String {
    let paragraphs: Vec<&str> = resume
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let chosen = match paragraphs.len() {
        0 => resume.trim(),
        n => paragraphs[index % n],
    };
    chosen.chars().take(RESUME_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_rotates_paragraphs() {
        let resume = "Education: BTech CSE\n\nProject: chat server in Rust\n\nIntern: payments team";
        assert_eq!(resume_excerpt(resume, 0), "Education: BTech CSE");
        assert_eq!(resume_excerpt(resume, 1), "Project: chat server in Rust");
        assert_eq!(resume_excerpt(resume, 3), "Education: BTech CSE");
    }

    #[test]
    fn test_excerpt_capped() {
        let long = "x".repeat(2_000);
        assert_eq!(resume_excerpt(&long, 0).len(), RESUME_EXCERPT_CHARS);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Introduction < Stage::BranchSelection);
        assert!(Stage::BranchSelection < Stage::Interview);
        assert!(Stage::Interview < Stage::Feedback);
    }
}
