//! Domain keyword coverage
//!
//! Scores a transcript by how many of a branch's expected technical terms it
//! mentions. The whole cumulative transcript is scored each time, so the most
//! recent result supersedes earlier ones.

use super::{KeywordScorer, Probe, ProviderError};
use icoach_common::models::KeywordResult;
use std::collections::HashMap;

/// Domain used when the requested one has no table
pub const DEFAULT_DOMAIN: &str = "cse";

/// Coverage multiplier; mentioning two thirds of the terms earns full marks
const COVERAGE_SCALE: f64 = 150.0;

/// Missing terms reported back to the client
const MISSING_REPORTED: usize = 5;

const DOMAIN_KEYWORDS: [(&str, &[&str]); 6] = [
    (
        "cse",
        &[
            "algorithm", "database", "api", "system design", "oop", "java", "python", "sql",
            "networking", "os",
        ],
    ),
    (
        "ai",
        &[
            "machine learning", "deep learning", "neural network", "nlp", "pytorch", "tensorflow",
            "model",
        ],
    ),
    (
        "mechanical",
        &["thermodynamics", "fluid mechanics", "cad", "manufacturing", "gears", "stress"],
    ),
    (
        "civil",
        &["structural analysis", "concrete", "surveying", "autocad", "soil mechanics"],
    ),
    (
        "ec",
        &["vlsi", "embedded systems", "microcontroller", "analog", "digital signal processing"],
    ),
    ("eee", &["circuit", "power systems", "generator", "transformer", "grid"]),
];

pub struct DomainKeywordScorer {
    tables: HashMap<&'static str, &'static [&'static str]>,
}

impl DomainKeywordScorer {
    pub fn new() -> Self {
        Self {
            tables: DOMAIN_KEYWORDS.iter().copied().collect(),
        }
    }

    fn table(&self, domain: &str) -> &'static [&'static str] {
        let domain = domain.trim().to_lowercase();
        self.tables
            .get(domain.as_str())
            .or_else(|| self.tables.get(DEFAULT_DOMAIN))
            .copied()
            .unwrap_or(&[])
    }
}

impl Default for DomainKeywordScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl Probe for DomainKeywordScorer {
    fn name(&self) -> &'static str {
        "domain_keywords"
    }
}

impl KeywordScorer for DomainKeywordScorer {
    fn score(&self, text: &str, domain: &str) -> Result<KeywordResult, ProviderError> {
        let expected = self.table(domain);
        if expected.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "no keyword table for domain {}",
                domain
            )));
        }

        let lowered = text.to_lowercase();
        let (matched, missing): (Vec<&str>, Vec<&str>) =
            expected.iter().copied().partition(|keyword| lowered.contains(*keyword));

        let coverage = matched.len() as f64 / expected.len() as f64;
        Ok(KeywordResult {
            score: (coverage * COVERAGE_SCALE).min(100.0),
            matched: matched.into_iter().map(str::to_string).collect(),
            missing: missing
                .into_iter()
                .take(MISSING_REPORTED)
                .map(str::to_string)
                .collect(),
        })
    }
}
