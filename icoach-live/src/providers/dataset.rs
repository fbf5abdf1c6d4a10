//! JSON question dataset
//!
//! Layout:
//! ```json
//! {
//!   "common": [{"id": "...", "text": "...", "ideal_answer": "..."}],
//!   "branches": {"CSE": [...], "EC": [...]}
//! }
//! ```
//! A branch's question list is its own questions followed by the common ones.

use super::{Probe, ProviderError, QuestionProvider};
use icoach_common::models::{Question, QuestionSource};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_DATASET: &str = include_str!("../../data/questions.json");

#[derive(Debug, Deserialize)]
struct DatasetEntry {
    id: String,
    text: String,
    #[serde(default)]
    ideal_answer: String,
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default)]
    common: Vec<DatasetEntry>,
    branches: BTreeMap<String, Vec<DatasetEntry>>,
}

pub struct JsonQuestionProvider {
    source: &'static str,
    common: Vec<Question>,
    branches: BTreeMap<String, Vec<Question>>,
}

impl JsonQuestionProvider {
    /// Dataset compiled into the binary
    pub fn builtin() -> Result<Self, ProviderError> {
        Self::parse(BUILTIN_DATASET, "builtin_dataset")
    }

    pub fn from_path(path: &Path) -> Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, "json_dataset")
    }

    pub fn parse(content: &str, source: &'static str) -> Result<Self, ProviderError> {
        let file: DatasetFile = serde_json::from_str(content)
            .map_err(|e| ProviderError::Decode(format!("question dataset: {}", e)))?;

        if file.branches.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "question dataset defines no branches".to_string(),
            ));
        }

        let branches = file
            .branches
            .into_iter()
            .map(|(name, entries)| (name, entries.into_iter().map(into_question).collect()))
            .collect();

        Ok(Self {
            source,
            common: file.common.into_iter().map(into_question).collect(),
            branches,
        })
    }
}

fn into_question(entry: DatasetEntry) -> Question {
    Question {
        id: entry.id,
        text: entry.text,
        ideal_answer: entry.ideal_answer,
        source: QuestionSource::Dataset,
    }
}

impl Probe for JsonQuestionProvider {
    fn name(&self) -> &'static str {
        self.source
    }
}

impl QuestionProvider for JsonQuestionProvider {
    fn branches(&self) -> Vec<String> {
        self.branches.keys().cloned().collect()
    }

    fn questions(&self, branch: &str) -> Result<Vec<Question>, ProviderError> {
        let own = self
            .branches
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(branch.trim()))
            .map(|(_, questions)| questions)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("unknown branch: {}", branch)))?;

        Ok(own.iter().chain(self.common.iter()).cloned().collect())
    }
}
